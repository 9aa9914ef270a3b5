use anyhow::{anyhow, bail, Context, Result};
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};

const FRAME_KEY: &str = "frame";

/// One group's values for one tick
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub group_name: String,

    /// Wall-clock UTC seconds since the epoch, shared by every group of a tick
    pub timestamp: f64,

    /// Signal values keyed by name, in plan order
    pub values: Vec<(String, f64)>,

    /// Tick index, shared by every group of a tick
    pub frame: u64,
}

impl Packet {
    pub fn new(
        group_name: impl Into<String>,
        values: Vec<(String, f64)>,
        timestamp: f64,
        frame: u64,
    ) -> Self {
        Self {
            group_name: group_name.into(),
            timestamp,
            values,
            frame,
        }
    }

    pub fn value(&self, signal: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(name, _)| name == signal)
            .map(|(_, v)| *v)
    }

    /// Compact JSON: `{"type":..,"timestamp":..,"data":{<signals>..,"frame":n}}`
    ///
    /// JSON has no NaN or infinity, so non-finite numbers are rejected here
    /// instead of going out as `null`.
    pub fn encode(&self) -> Result<Vec<u8>> {
        if !self.timestamp.is_finite() {
            bail!("Packet for '{}' has non-finite timestamp {}", self.group_name, self.timestamp);
        }
        if let Some((name, v)) = self.values.iter().find(|(_, v)| !v.is_finite()) {
            bail!("Signal '{}' has non-finite value {}", name, v);
        }
        serde_json::to_vec(self).context("Failed to encode packet")
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let wire: WirePacket =
            serde_json::from_slice(bytes).context("Failed to parse packet JSON")?;

        let mut frame = None;
        let mut values = Vec::with_capacity(wire.data.len().saturating_sub(1));
        for (key, value) in wire.data {
            if key == FRAME_KEY {
                frame = Some(
                    value
                        .as_u64()
                        .ok_or_else(|| anyhow!("Field 'frame' is not an unsigned integer: {}", value))?,
                );
                continue;
            }
            let v = value
                .as_f64()
                .ok_or_else(|| anyhow!("Signal '{}' is not a number: {}", key, value))?;
            values.push((key, v));
        }

        let Some(frame) = frame else {
            bail!("Packet for '{}' has no 'frame' field", wire.kind);
        };

        Ok(Self {
            group_name: wire.kind,
            timestamp: wire.timestamp,
            values,
            frame,
        })
    }
}

impl Serialize for Packet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut packet = serializer.serialize_struct("Packet", 3)?;
        packet.serialize_field("type", &self.group_name)?;
        packet.serialize_field("timestamp", &self.timestamp)?;
        packet.serialize_field("data", &PacketData(self))?;
        packet.end()
    }
}

struct PacketData<'a>(&'a Packet);

impl Serialize for PacketData<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut data = serializer.serialize_map(Some(self.0.values.len() + 1))?;
        for (name, value) in &self.0.values {
            data.serialize_entry(name, value)?;
        }
        data.serialize_entry(FRAME_KEY, &self.0.frame)?;
        data.end()
    }
}

#[derive(Deserialize)]
struct WirePacket {
    #[serde(rename = "type")]
    kind: String,
    timestamp: f64,
    data: Map<String, Value>,
}

/// Current UTC time as fractional seconds since the epoch
pub fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}
