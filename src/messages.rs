//! JSON control payloads exchanged inside frames.
//!
//! Field declaration order matters for the serialized output: the phone's
//! handshake validator saw these keys in exactly this order from the real
//! companion app, and serde_json emits struct fields in declaration order.
//! Compact encoding (no spaces) is serde_json's default, which matches the
//! wire captures.

use serde::{Deserialize, Serialize};

use crate::protocol::DEFAULT_PACKET_SIZE;

/// Client hello payload. Only `device.deviceName` is required; everything
/// else is tolerated and logged, never validated.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientHello {
    #[serde(default = "default_packet_size")]
    pub accepted_packet_size: u32,
    pub device: DeviceDescriptor,
}

fn default_packet_size() -> u32 {
    DEFAULT_PACKET_SIZE
}

/// Device identity block of the client hello.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    pub device_name: String,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub manufacturer_name: Option<String>,
    #[serde(default)]
    pub sys: Option<String>,
}

/// File transfer metadata frame payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub file_name: String,
    pub file_size: u64,
}

/// The identity this server presents during the handshake. Injected as
/// configuration so tests and operators can run alternate identities; the
/// defaults are the values the unmodified mobile client is known to accept.
#[derive(Debug, Clone)]
pub struct ServerIdentity {
    pub accepted_packet_size: u32,
    pub app_name: String,
    pub app_package: String,
    pub app_version_code: u32,
    pub battery_level: u8,
    pub device_name: String,
    pub device_type: String,
    pub exd: String,
    pub manufacturer_name: String,
    pub sys: String,
}

impl Default for ServerIdentity {
    fn default() -> Self {
        Self {
            accepted_packet_size: 24576,
            app_name: "Voice Recorder Companion".to_string(),
            app_package: "pl.mobimax.voicerecorder".to_string(),
            app_version_code: 18_061_026,
            battery_level: 0,
            device_name: "Python SM-S928U1".to_string(),
            device_type: "phone".to_string(),
            exd: "mobile".to_string(),
            manufacturer_name: "samsung".to_string(),
            sys: "android".to_string(),
        }
    }
}

impl ServerIdentity {
    /// Build the hello payload, reporting `ip` as this device's address.
    pub fn hello(&self, ip: &str) -> ServerHello {
        ServerHello {
            accepted_packet_size: self.accepted_packet_size,
            app_info: AppInfo {
                app_name: self.app_name.clone(),
                app_package: self.app_package.clone(),
                app_version_code: self.app_version_code,
            },
            can_receive_file: true,
            can_send_file: true,
            device: ServerDevice {
                battery_level: self.battery_level,
                device_ip_address: ip.to_string(),
                device_name: self.device_name.clone(),
                device_type: self.device_type.clone(),
                exd: self.exd.clone(),
                manufacturer_name: self.manufacturer_name.clone(),
                sys: self.sys.clone(),
            },
            ip_address: ip.to_string(),
        }
    }
}

/// Server hello payload. Do not reorder fields.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerHello {
    pub accepted_packet_size: u32,
    pub app_info: AppInfo,
    pub can_receive_file: bool,
    pub can_send_file: bool,
    pub device: ServerDevice,
    pub ip_address: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInfo {
    pub app_name: String,
    pub app_package: String,
    pub app_version_code: u32,
}

/// Device block of the server hello. Do not reorder fields.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerDevice {
    pub battery_level: u8,
    pub device_ip_address: String,
    pub device_name: String,
    pub device_type: String,
    pub exd: String,
    pub manufacturer_name: String,
    pub sys: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_hello_exact_bytes() {
        // The client validator is the compatibility bar: key set, nesting,
        // order, and compact separators all have to match the capture.
        let hello = ServerIdentity::default().hello("192.168.1.50");
        let json = serde_json::to_string(&hello).unwrap();
        assert_eq!(
            json,
            concat!(
                r#"{"acceptedPacketSize":24576,"#,
                r#""appInfo":{"appName":"Voice Recorder Companion","#,
                r#""appPackage":"pl.mobimax.voicerecorder","appVersionCode":18061026},"#,
                r#""canReceiveFile":true,"canSendFile":true,"#,
                r#""device":{"batteryLevel":0,"deviceIpAddress":"192.168.1.50","#,
                r#""deviceName":"Python SM-S928U1","deviceType":"phone","exd":"mobile","#,
                r#""manufacturerName":"samsung","sys":"android"},"#,
                r#""ipAddress":"192.168.1.50"}"#,
            )
        );
    }

    #[test]
    fn test_client_hello_parses_observed_shape() {
        let payload = r#"{
            "acceptedPacketSize": 4096,
            "device": {
                "deviceName": "SM-A526B",
                "deviceType": "phone",
                "manufacturerName": "samsung",
                "sys": "android",
                "batteryLevel": 77
            }
        }"#;
        let hello: ClientHello = serde_json::from_str(payload).unwrap();
        assert_eq!(hello.accepted_packet_size, 4096);
        assert_eq!(hello.device.device_name, "SM-A526B");
        assert_eq!(hello.device.sys.as_deref(), Some("android"));
    }

    #[test]
    fn test_client_hello_packet_size_defaults() {
        let payload = r#"{"device":{"deviceName":"SM-A526B"}}"#;
        let hello: ClientHello = serde_json::from_str(payload).unwrap();
        assert_eq!(hello.accepted_packet_size, DEFAULT_PACKET_SIZE);
    }

    #[test]
    fn test_client_hello_requires_device() {
        assert!(serde_json::from_str::<ClientHello>(r#"{"acceptedPacketSize":1024}"#).is_err());
        assert!(serde_json::from_str::<ClientHello>(r#"{"device":{}}"#).is_err());
    }

    #[test]
    fn test_metadata_parses() {
        let meta: FileMetadata =
            serde_json::from_str(r#"{"fileName":"voice_0042.m4a","fileSize":524288}"#).unwrap();
        assert_eq!(meta.file_name, "voice_0042.m4a");
        assert_eq!(meta.file_size, 524288);
    }

    #[test]
    fn test_metadata_rejects_missing_or_negative_fields() {
        assert!(serde_json::from_str::<FileMetadata>(r#"{"fileName":"a.m4a"}"#).is_err());
        assert!(serde_json::from_str::<FileMetadata>(r#"{"fileSize":10}"#).is_err());
        assert!(
            serde_json::from_str::<FileMetadata>(r#"{"fileName":"a.m4a","fileSize":-1}"#).is_err()
        );
    }
}
