/*
[INPUT]:  Subscription intent, credentials, and a signing secret
[OUTPUT]: Signed control messages ready for the socket
[POS]:    Data layer - outbound subscribe/unsubscribe envelope
[UPDATE]: When the control protocol fields or signing payload change
*/

use serde::{Deserialize, Serialize};

use super::enums::{ChannelKind, ControlType};
use crate::auth::HmacSigner;
use crate::error::Result;

/// Signed subscribe/unsubscribe request.
///
/// Fields are private so a built message cannot be altered after signing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlMessage {
    #[serde(rename = "type")]
    control_type: ControlType,
    product_ids: Vec<String>,
    channel: ChannelKind,
    api_key: String,
    timestamp: String,
    signature: String,
}

impl ControlMessage {
    /// Build and sign a control message.
    ///
    /// Signed payload: `timestamp + channel + product_ids.join(",")`
    pub fn signed(
        control_type: ControlType,
        channel: ChannelKind,
        product_ids: &[String],
        api_key: &str,
        timestamp: i64,
        signer: &HmacSigner,
    ) -> Result<Self> {
        let timestamp = timestamp.to_string();
        let payload = signing_payload(&timestamp, channel, product_ids);
        let signature = signer.sign(payload.as_bytes())?;

        Ok(Self {
            control_type,
            product_ids: product_ids.to_vec(),
            channel,
            api_key: api_key.to_string(),
            timestamp,
            signature,
        })
    }

    pub fn control_type(&self) -> ControlType {
        self.control_type
    }

    pub fn channel(&self) -> ChannelKind {
        self.channel
    }

    pub fn product_ids(&self) -> &[String] {
        &self.product_ids
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

pub(crate) fn signing_payload(timestamp: &str, channel: ChannelKind, product_ids: &[String]) -> String {
    format!("{timestamp}{}{}", channel.wire_name(), product_ids.join(","))
}
