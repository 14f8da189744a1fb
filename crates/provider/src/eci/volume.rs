use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{KeyToPath, Volume as PodVolume};

use super::types::{ConfigFileToPath, Volume, VOL_TYPE_CONFIG_FILE, VOL_TYPE_EMPTY_DIR, VOL_TYPE_NFS};
use crate::{Error, Result};

/// The pod volume sources the remote service can materialise.
#[derive(Debug, Clone, PartialEq)]
pub enum VolumeKind<'a> {
    EmptyDir,
    Nfs {
        server: &'a str,
        path: &'a str,
        read_only: bool,
    },
    ConfigMap {
        name: &'a str,
        optional: Option<bool>,
        items: &'a [KeyToPath],
    },
    Secret {
        name: &'a str,
        optional: Option<bool>,
        items: &'a [KeyToPath],
    },
}

impl<'a> VolumeKind<'a> {
    /// Classify a pod volume, failing for any source outside the supported set.
    pub fn classify(volume: &'a PodVolume, pod: &str) -> Result<Self> {
        if volume.empty_dir.is_some() {
            return Ok(VolumeKind::EmptyDir);
        }
        if let Some(nfs) = &volume.nfs {
            return Ok(VolumeKind::Nfs {
                server: &nfs.server,
                path: &nfs.path,
                read_only: nfs.read_only.unwrap_or(false),
            });
        }
        if let Some(source) = &volume.config_map {
            return Ok(VolumeKind::ConfigMap {
                name: source.name.as_deref().unwrap_or_default(),
                optional: source.optional,
                items: source.items.as_deref().unwrap_or_default(),
            });
        }
        if let Some(source) = &volume.secret {
            return Ok(VolumeKind::Secret {
                name: source.secret_name.as_deref().unwrap_or_default(),
                optional: source.optional,
                items: source.items.as_deref().unwrap_or_default(),
            });
        }

        Err(Error::UnsupportedVolume {
            volume: volume.name.clone(),
            pod: pod.to_string(),
        })
    }

    /// Kind label used in missing-reference errors.
    pub fn reference_kind(&self) -> &'static str {
        match self {
            VolumeKind::ConfigMap { .. } => "ConfigMap",
            VolumeKind::Secret { .. } => "Secret",
            VolumeKind::EmptyDir => "EmptyDir",
            VolumeKind::Nfs { .. } => "NFS",
        }
    }
}

pub fn empty_dir(name: &str) -> Volume {
    Volume {
        volume_type: VOL_TYPE_EMPTY_DIR.to_string(),
        name: name.to_string(),
        empty_dir_volume_enable: true,
        ..Default::default()
    }
}

pub fn nfs(name: &str, server: &str, path: &str, read_only: bool) -> Volume {
    Volume {
        volume_type: VOL_TYPE_NFS.to_string(),
        name: name.to_string(),
        nfs_volume_server: server.to_string(),
        nfs_volume_path: path.to_string(),
        nfs_volume_read_only: read_only,
        ..Default::default()
    }
}

/// Project resolved key/value data onto file paths.
///
/// Without `items` every key becomes a file named after the key; with `items`
/// only the listed keys are projected, onto their requested paths. Returns
/// `None` when nothing would be mounted.
pub fn config_files(
    name: &str,
    entries: BTreeMap<String, String>,
    items: &[KeyToPath],
) -> Option<Volume> {
    let files: Vec<ConfigFileToPath> = if items.is_empty() {
        entries
            .into_iter()
            .map(|(path, content)| ConfigFileToPath { content, path })
            .collect()
    } else {
        items
            .iter()
            .filter_map(|item| {
                entries.get(&item.key).map(|content| ConfigFileToPath {
                    content: content.clone(),
                    path: item.path.clone(),
                })
            })
            .collect()
    };

    if files.is_empty() {
        return None;
    }
    Some(Volume {
        volume_type: VOL_TYPE_CONFIG_FILE.to_string(),
        name: name.to_string(),
        config_file_to_paths: files,
        ..Default::default()
    })
}
