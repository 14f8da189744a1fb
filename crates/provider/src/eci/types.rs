//! Wire payloads exchanged with the elastic container instance service.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const CREATE_CONTAINER_GROUP: &str = "CreateContainerGroup";
pub const DELETE_CONTAINER_GROUP: &str = "DeleteContainerGroup";
pub const DESCRIBE_CONTAINER_GROUPS: &str = "DescribeContainerGroups";

pub const VOL_TYPE_NFS: &str = "NFSVolume";
pub const VOL_TYPE_EMPTY_DIR: &str = "EmptyDirVolume";
pub const VOL_TYPE_CONFIG_FILE: &str = "ConfigFileVolume";

/// Pod-tag timestamps use dashes so they survive as resource labels.
pub const POD_TAG_TIME_FORMAT: &str = "%Y-%m-%dT%H-%M-%SZ";
pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateContainerGroup {
    pub site_id: String,
    pub cluster_id: String,
    pub node_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub node_name: String,
    pub namespace: String,
    pub bill_method: i32,
    pub owner_references: BTreeMap<String, String>,
    #[serde(rename = "name")]
    pub container_group_name: String,
    pub pod_name: String,
    pub cpu: f64,
    pub memory: f64,
    pub restart_policy: String,
    #[serde(rename = "ephemeral_storage_type")]
    pub storage_type: String,
    #[serde(rename = "ephemeral_storage_size")]
    pub storage_size: u32,
    #[serde(rename = "private_pipe_id")]
    pub private_id: String,
    #[serde(rename = "container")]
    pub containers: Vec<ContainerInfo>,
    #[serde(rename = "init_container")]
    pub init_containers: Vec<ContainerInfo>,
    pub volumes: Vec<Volume>,
    #[serde(rename = "image_registry_credential")]
    pub image_registry_credentials: Vec<ImageRegistryCredential>,
    pub creation_timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteContainerGroup {
    pub container_group_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DescribeContainerGroups {
    pub site_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub node_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub node_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub container_group_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub container_group_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerGroupList {
    #[serde(default)]
    pub eci: Vec<ContainerGroup>,
}

/// A container group as reported by the remote service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerGroup {
    pub container_group_id: String,
    pub container_group_name: String,
    pub task_id: String,
    pub task_state: String,
    pub pod_name: String,
    pub namespace: String,
    pub site_id: String,
    pub memory: f64,
    pub cpu: f64,
    pub private_id: String,
    pub restart_policy: String,
    pub intranet_ip: String,
    pub status: String,
    pub creation_time: String,
    pub succeeded_time: String,
    pub volumes: Vec<Volume>,
    pub events: Vec<Event>,
    pub containers: Vec<ContainerInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerInfo {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    pub image: String,
    #[serde(rename = "version")]
    pub image_version: String,
    pub image_pull_policy: String,
    pub working_dir: String,
    #[serde(rename = "arg")]
    pub args: Vec<String>,
    pub command: Vec<String>,
    pub memory: f64,
    pub cpu: f64,
    pub ports: Vec<ContainerPort>,
    #[serde(rename = "environment_var")]
    pub environment_vars: Vec<EnvironmentVar>,
    pub volume_mounts: Vec<VolumeMount>,
    #[serde(skip_serializing_if = "is_zero")]
    pub restart_count: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_state: Option<ContainerState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_state: Option<ContainerState>,
}

fn is_zero(value: &i32) -> bool {
    *value == 0
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerState {
    pub state: String,
    pub detail_status: String,
    pub exit_code: i32,
    pub start_time: String,
    pub finish_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRegistryCredential {
    pub server: String,
    #[serde(rename = "user_name")]
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentVar {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerPort {
    pub port: i32,
    pub protocol: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMount {
    pub mount_path: String,
    pub read_only: bool,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Event {
    pub count: i32,
    #[serde(rename = "type")]
    pub event_type: String,
    pub name: String,
    pub message: String,
    pub first_timestamp: String,
    pub last_timestamp: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Volume {
    #[serde(rename = "type")]
    pub volume_type: String,
    pub name: String,
    pub nfs_volume_path: String,
    pub nfs_volume_server: String,
    pub nfs_volume_read_only: bool,
    pub empty_dir_volume_enable: bool,
    pub config_file_to_paths: Vec<ConfigFileToPath>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFileToPath {
    pub content: String,
    pub path: String,
}
