//! Pod → `CreateContainerGroup` translation.
//!
//! `command` and `args` are concatenated into the remote `command` list and
//! the remote `arg` list is always sent empty.

use std::collections::BTreeMap;

use chrono::Utc;
use k8s_openapi::api::core::v1::{Container, Pod, PodSpec};
use tracing::debug;

use super::credentials::RegistryAuthFormat;
use super::quantity;
use super::types::{
    ContainerInfo, ContainerPort, CreateContainerGroup, EnvironmentVar, ImageRegistryCredential,
    Volume, VolumeMount, POD_TAG_TIME_FORMAT,
};
use super::volume::{self, VolumeKind};
use crate::config::NodeConfig;
use crate::resources::ResourceManager;
use crate::{Error, Result};

pub const STORAGE_TYPE_ANNOTATION: &str = "eci-storage-type";
pub const STORAGE_SIZE_ANNOTATION: &str = "eci-storage-size";
pub const DEFAULT_STORAGE_TYPE: &str = "high_disk";
pub const DEFAULT_STORAGE_SIZE: u32 = 20;
const DEFAULT_IMAGE_TAG: &str = "latest";

/// Per-container fallbacks when neither limits nor requests are declared.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceDefaults {
    pub cpu: f64,
    pub memory: f64,
}

impl ResourceDefaults {
    pub const REGULAR: ResourceDefaults = ResourceDefaults {
        cpu: 1.0,
        memory: 2.0,
    };
    pub const INIT: ResourceDefaults = ResourceDefaults {
        cpu: 0.0,
        memory: 0.0,
    };
}

/// Composite name the remote service knows a pod by.
pub fn group_name(namespace: &str, name: &str) -> String {
    format!("{}-{}", namespace, name)
}

pub fn pod_namespace(pod: &Pod) -> &str {
    pod.metadata.namespace.as_deref().unwrap_or("default")
}

pub fn pod_name(pod: &Pod) -> &str {
    pod.metadata.name.as_deref().unwrap_or_default()
}

/// Build the create payload for `pod`, resolving every secret and config map
/// it references. Any failure aborts the whole translation.
pub async fn create_request(
    pod: &Pod,
    node: &NodeConfig,
    resources: &dyn ResourceManager,
) -> Result<CreateContainerGroup> {
    let name = pod
        .metadata
        .name
        .as_deref()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| Error::Unsupported("pod has no name".to_string()))?;
    let namespace = pod_namespace(pod);
    let spec = pod
        .spec
        .as_ref()
        .ok_or_else(|| Error::Unsupported(format!("pod {} has no spec", name)))?;

    let (regular, cpu, memory) = containers(&spec.containers, ResourceDefaults::REGULAR)?;
    let (init, init_cpu, init_memory) = containers(
        spec.init_containers.as_deref().unwrap_or_default(),
        ResourceDefaults::INIT,
    )?;
    let volumes = resolve_volumes(spec, namespace, name, resources).await?;
    let image_registry_credentials = resolve_credentials(spec, namespace, name, resources).await?;

    let owner_references = pod
        .metadata
        .owner_references
        .as_ref()
        .and_then(|owners| owners.first())
        .map(|owner| {
            BTreeMap::from([
                ("kind".to_string(), owner.kind.clone()),
                ("name".to_string(), owner.name.clone()),
            ])
        })
        .unwrap_or_default();

    let creation = pod
        .metadata
        .creation_timestamp
        .as_ref()
        .map(|t| t.0)
        .unwrap_or_else(Utc::now);
    let (storage_type, storage_size) = storage(pod);

    Ok(CreateContainerGroup {
        site_id: node.site_id.clone(),
        cluster_id: node.cluster_id.clone(),
        node_id: node.node_id.clone(),
        node_name: node.node_name.clone(),
        namespace: namespace.to_string(),
        bill_method: 0,
        owner_references,
        container_group_name: group_name(namespace, name),
        pod_name: name.to_string(),
        cpu: cpu + init_cpu,
        memory: memory + init_memory,
        restart_policy: spec.restart_policy.clone().unwrap_or_else(|| "Always".to_string()),
        storage_type,
        storage_size,
        private_id: node.private_id.clone(),
        containers: regular,
        init_containers: init,
        volumes,
        image_registry_credentials,
        creation_timestamp: creation.format(POD_TAG_TIME_FORMAT).to_string(),
    })
}

/// Split an image reference into repository and tag.
///
/// A colon followed by text containing `/` is a registry port, not a tag.
pub fn split_image(image: &str) -> (String, String) {
    match image.rsplit_once(':') {
        Some((repo, tag)) if !tag.is_empty() && !tag.contains('/') => {
            (repo.to_string(), tag.to_string())
        }
        Some((repo, "")) => (repo.to_string(), DEFAULT_IMAGE_TAG.to_string()),
        _ => (image.to_string(), DEFAULT_IMAGE_TAG.to_string()),
    }
}

/// Translate one container list, returning the containers and their cpu and
/// memory totals.
pub fn containers(
    list: &[Container],
    defaults: ResourceDefaults,
) -> Result<(Vec<ContainerInfo>, f64, f64)> {
    let mut translated = Vec::with_capacity(list.len());
    let (mut cpu, mut memory) = (0.0, 0.0);
    for container in list {
        let info = container_info(container, defaults)?;
        cpu += info.cpu;
        memory += info.memory;
        translated.push(info);
    }
    Ok((translated, cpu, memory))
}

fn container_info(container: &Container, defaults: ResourceDefaults) -> Result<ContainerInfo> {
    let (image, image_version) = split_image(container.image.as_deref().unwrap_or_default());

    let mut command = container.command.clone().unwrap_or_default();
    command.extend(container.args.iter().flatten().cloned());

    let resources = container.resources.as_ref();
    let pick = |key: &str| {
        let limits = resources.and_then(|r| r.limits.as_ref()).and_then(|l| l.get(key));
        let requests = resources.and_then(|r| r.requests.as_ref()).and_then(|r| r.get(key));
        limits.or(requests)
    };
    let cpu = match pick("cpu") {
        Some(q) => quantity::cpu_cores(q, &container.name)?,
        None => defaults.cpu,
    };
    let memory = match pick("memory") {
        Some(q) => quantity::memory_gib(q, &container.name)?,
        None => defaults.memory,
    };

    let ports = container
        .ports
        .iter()
        .flatten()
        .map(|p| ContainerPort {
            port: p.container_port,
            protocol: p.protocol.clone().unwrap_or_else(|| "TCP".to_string()),
        })
        .collect();

    let environment_vars = container
        .env
        .iter()
        .flatten()
        .filter_map(|e| match &e.value {
            Some(value) => Some(EnvironmentVar {
                key: e.name.clone(),
                value: value.clone(),
            }),
            None => {
                debug!(container = %container.name, env = %e.name, "Skipping env var without a literal value");
                None
            }
        })
        .collect();

    let volume_mounts = container
        .volume_mounts
        .iter()
        .flatten()
        .map(|m| VolumeMount {
            mount_path: m.mount_path.clone(),
            read_only: m.read_only.unwrap_or(false),
            name: m.name.clone(),
        })
        .collect();

    Ok(ContainerInfo {
        name: container.name.clone(),
        image,
        image_version,
        image_pull_policy: container.image_pull_policy.clone().unwrap_or_default(),
        working_dir: container.working_dir.clone().unwrap_or_default(),
        args: Vec::new(),
        command,
        memory,
        cpu,
        ports,
        environment_vars,
        volume_mounts,
        ..Default::default()
    })
}

async fn resolve_volumes(
    spec: &PodSpec,
    namespace: &str,
    pod: &str,
    resources: &dyn ResourceManager,
) -> Result<Vec<Volume>> {
    let mut volumes = Vec::new();
    for source in spec.volumes.iter().flatten() {
        let kind = VolumeKind::classify(source, pod)?;
        let label = kind.reference_kind();
        let resolved = match kind {
            VolumeKind::EmptyDir => Some(volume::empty_dir(&source.name)),
            VolumeKind::Nfs {
                server,
                path,
                read_only,
            } => Some(volume::nfs(&source.name, server, path, read_only)),
            VolumeKind::ConfigMap {
                name,
                optional,
                items,
            } => match resources.get_config_map(name, namespace).await? {
                Some(config_map) => {
                    let mut entries = config_map.data.unwrap_or_default();
                    for (key, bytes) in config_map.binary_data.unwrap_or_default() {
                        entries.insert(key, String::from_utf8_lossy(&bytes.0).into_owned());
                    }
                    volume::config_files(&source.name, entries, items)
                }
                None => missing(label, name, optional, pod)?,
            },
            VolumeKind::Secret {
                name,
                optional,
                items,
            } => match resources.get_secret(name, namespace).await? {
                Some(secret) => {
                    let entries = secret
                        .data
                        .unwrap_or_default()
                        .into_iter()
                        .map(|(key, bytes)| (key, String::from_utf8_lossy(&bytes.0).into_owned()))
                        .collect();
                    volume::config_files(&source.name, entries, items)
                }
                None => missing(label, name, optional, pod)?,
            },
        };

        match resolved {
            Some(v) => volumes.push(v),
            None => debug!(pod, volume = %source.name, "Omitting volume with nothing to mount"),
        }
    }
    Ok(volumes)
}

/// An absent reference is only fatal when the pod marked it non-optional.
fn missing(kind: &'static str, name: &str, optional: Option<bool>, pod: &str) -> Result<Option<Volume>> {
    if optional == Some(false) {
        return Err(Error::MissingResource {
            kind,
            name: name.to_string(),
            pod: pod.to_string(),
        });
    }
    Ok(None)
}

async fn resolve_credentials(
    spec: &PodSpec,
    namespace: &str,
    pod: &str,
    resources: &dyn ResourceManager,
) -> Result<Vec<ImageRegistryCredential>> {
    let mut credentials = Vec::new();
    for reference in spec.image_pull_secrets.iter().flatten() {
        let name = reference.name.as_deref().unwrap_or_default();
        let secret = resources
            .get_secret(name, namespace)
            .await?
            .ok_or_else(|| Error::MissingResource {
                kind: "Secret",
                name: name.to_string(),
                pod: pod.to_string(),
            })?;
        let format = RegistryAuthFormat::of(&secret)?;
        credentials.extend(format.read(&secret)?);
    }
    Ok(credentials)
}

/// Ephemeral storage class and size from pod annotations.
pub fn storage(pod: &Pod) -> (String, u32) {
    let annotations = pod.metadata.annotations.as_ref();
    let storage_type = annotations
        .and_then(|a| a.get(STORAGE_TYPE_ANNOTATION))
        .filter(|t| !t.is_empty())
        .cloned()
        .unwrap_or_else(|| DEFAULT_STORAGE_TYPE.to_string());
    let storage_size = annotations
        .and_then(|a| a.get(STORAGE_SIZE_ANNOTATION))
        .and_then(|s| s.trim().parse::<u32>().ok())
        .filter(|size| *size > 0)
        .unwrap_or(DEFAULT_STORAGE_SIZE);
    (storage_type, storage_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eci::types::{VOL_TYPE_CONFIG_FILE, VOL_TYPE_EMPTY_DIR};
    use crate::resources::MockResourceManager;
    use k8s_openapi::api::core::v1::{
        ConfigMap, ConfigMapVolumeSource, EmptyDirVolumeSource, EnvVar, LocalObjectReference,
        ResourceRequirements, Secret, SecretVolumeSource, Volume as PodVolume,
    };
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference, Time};
    use k8s_openapi::ByteString;
    use mockall::predicate::eq;
    use serde_json::json;

    fn node() -> NodeConfig {
        NodeConfig {
            site_id: "site-1".to_string(),
            cluster_id: "cluster-1".to_string(),
            node_id: "node-1".to_string(),
            private_id: "pipe-1".to_string(),
            ..Default::default()
        }
    }

    fn container(name: &str, image: &str) -> Container {
        Container {
            name: name.to_string(),
            image: Some(image.to_string()),
            ..Default::default()
        }
    }

    fn limits(cpu: &str, memory: &str) -> ResourceRequirements {
        ResourceRequirements {
            limits: Some(BTreeMap::from([
                ("cpu".to_string(), Quantity(cpu.to_string())),
                ("memory".to_string(), Quantity(memory.to_string())),
            ])),
            ..Default::default()
        }
    }

    fn pod(containers: Vec<Container>) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some("web".to_string()),
                namespace: Some("ns".to_string()),
                creation_timestamp: Some(Time(
                    chrono::DateTime::parse_from_rfc3339("2024-03-04T05:06:07Z")
                        .unwrap()
                        .with_timezone(&Utc),
                )),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn translates_the_nginx_scenario() {
        let nginx = Container {
            resources: Some(limits("500m", "256Mi")),
            ..container("nginx", "nginx:1.21")
        };
        let resources = MockResourceManager::new();

        let request = create_request(&pod(vec![nginx]), &node(), &resources)
            .await
            .unwrap();

        assert_eq!(request.container_group_name, "ns-web");
        assert_eq!(request.pod_name, "web");
        assert_eq!(request.namespace, "ns");
        assert_eq!(request.containers[0].image, "nginx");
        assert_eq!(request.containers[0].image_version, "1.21");
        assert_eq!(request.containers[0].cpu, 0.5);
        assert!((request.containers[0].memory - 0.25).abs() < 1e-9);
        assert_eq!(request.cpu, 0.5);
        assert_eq!(request.site_id, "site-1");
        assert_eq!(request.private_id, "pipe-1");
        assert_eq!(request.creation_timestamp, "2024-03-04T05-06-07Z");
        assert_eq!(request.storage_type, DEFAULT_STORAGE_TYPE);
        assert_eq!(request.storage_size, DEFAULT_STORAGE_SIZE);
        assert_eq!(request.restart_policy, "Always");
        assert!(request.owner_references.is_empty());
    }

    #[tokio::test]
    async fn defaults_apply_separately_to_init_containers() {
        let mut workload = pod(vec![container("app", "busybox")]);
        workload.spec.as_mut().unwrap().init_containers = Some(vec![container("setup", "busybox")]);
        let resources = MockResourceManager::new();

        let request = create_request(&workload, &node(), &resources).await.unwrap();

        assert_eq!(request.containers[0].cpu, 1.0);
        assert_eq!(request.containers[0].memory, 2.0);
        assert_eq!(request.init_containers[0].cpu, 0.0);
        assert_eq!(request.init_containers[0].memory, 0.0);
        assert_eq!((request.cpu, request.memory), (1.0, 2.0));
    }

    #[test]
    fn empty_pod_has_zero_totals() {
        let (list, cpu, memory) = containers(&[], ResourceDefaults::REGULAR).unwrap();
        assert!(list.is_empty());
        assert_eq!((cpu, memory), (0.0, 0.0));
    }

    #[test]
    fn limits_win_over_requests() {
        let c = Container {
            resources: Some(ResourceRequirements {
                limits: Some(BTreeMap::from([("cpu".to_string(), Quantity("2".to_string()))])),
                requests: Some(BTreeMap::from([
                    ("cpu".to_string(), Quantity("250m".to_string())),
                    ("memory".to_string(), Quantity("512Mi".to_string())),
                ])),
                ..Default::default()
            }),
            ..container("app", "app")
        };
        let (list, cpu, memory) = containers(&[c], ResourceDefaults::REGULAR).unwrap();
        assert_eq!(list[0].cpu, 2.0);
        assert_eq!(cpu, 2.0);
        assert_eq!(memory, 0.5);
    }

    #[test]
    fn command_and_args_are_concatenated() {
        let c = Container {
            command: Some(vec!["sh".to_string(), "-c".to_string()]),
            args: Some(vec!["echo hi".to_string()]),
            env: Some(vec![
                EnvVar {
                    name: "MODE".to_string(),
                    value: Some("prod".to_string()),
                    value_from: None,
                },
                EnvVar {
                    name: "FROM_REF".to_string(),
                    value: None,
                    value_from: None,
                },
            ]),
            ..container("app", "app")
        };
        let (list, _, _) = containers(&[c], ResourceDefaults::REGULAR).unwrap();
        assert_eq!(list[0].command, vec!["sh", "-c", "echo hi"]);
        assert!(list[0].args.is_empty());
        assert_eq!(
            list[0].environment_vars,
            vec![EnvironmentVar {
                key: "MODE".to_string(),
                value: "prod".to_string()
            }]
        );
    }

    #[test]
    fn image_references_split_on_the_tag_colon_only() {
        assert_eq!(split_image("nginx:1.21"), ("nginx".into(), "1.21".into()));
        assert_eq!(split_image("nginx"), ("nginx".into(), "latest".into()));
        assert_eq!(
            split_image("registry.local:5000/team/app"),
            ("registry.local:5000/team/app".into(), "latest".into())
        );
        assert_eq!(
            split_image("registry.local:5000/team/app:v2"),
            ("registry.local:5000/team/app".into(), "v2".into())
        );
    }

    #[test]
    fn storage_annotations_fall_back_on_bad_values() {
        let mut workload = pod(vec![]);
        workload.metadata.annotations = Some(BTreeMap::from([
            (STORAGE_TYPE_ANNOTATION.to_string(), "ssd".to_string()),
            (STORAGE_SIZE_ANNOTATION.to_string(), "0".to_string()),
        ]));
        assert_eq!(storage(&workload), ("ssd".to_string(), 20));

        workload.metadata.annotations = Some(BTreeMap::from([(
            STORAGE_SIZE_ANNOTATION.to_string(),
            "40".to_string(),
        )]));
        assert_eq!(storage(&workload), ("high_disk".to_string(), 40));

        workload.metadata.annotations = Some(BTreeMap::from([(
            STORAGE_SIZE_ANNOTATION.to_string(),
            "big".to_string(),
        )]));
        assert_eq!(storage(&workload).1, 20);
    }

    #[tokio::test]
    async fn resolves_volumes_through_the_resource_manager() {
        let mut workload = pod(vec![container("app", "app")]);
        workload.metadata.owner_references = Some(vec![OwnerReference {
            kind: "ReplicaSet".to_string(),
            name: "web-5d8".to_string(),
            ..Default::default()
        }]);
        workload.spec.as_mut().unwrap().volumes = Some(vec![
            PodVolume {
                name: "scratch".to_string(),
                empty_dir: Some(EmptyDirVolumeSource::default()),
                ..Default::default()
            },
            PodVolume {
                name: "settings".to_string(),
                config_map: Some(ConfigMapVolumeSource {
                    name: Some("settings".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            },
            PodVolume {
                name: "tls".to_string(),
                secret: Some(SecretVolumeSource {
                    secret_name: Some("tls".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            },
            PodVolume {
                name: "maybe".to_string(),
                config_map: Some(ConfigMapVolumeSource {
                    name: Some("maybe".to_string()),
                    optional: Some(true),
                    ..Default::default()
                }),
                ..Default::default()
            },
        ]);

        let mut resources = MockResourceManager::new();
        resources
            .expect_get_config_map()
            .with(eq("settings"), eq("ns"))
            .returning(|_, _| {
                Ok(Some(ConfigMap {
                    data: Some(BTreeMap::from([(
                        "app.yaml".to_string(),
                        "port: 80\n".to_string(),
                    )])),
                    ..Default::default()
                }))
            });
        resources
            .expect_get_config_map()
            .with(eq("maybe"), eq("ns"))
            .returning(|_, _| Ok(None));
        resources
            .expect_get_secret()
            .with(eq("tls"), eq("ns"))
            .returning(|_, _| {
                Ok(Some(Secret {
                    data: Some(BTreeMap::from([(
                        "tls.key".to_string(),
                        ByteString(b"-----KEY-----".to_vec()),
                    )])),
                    ..Default::default()
                }))
            });

        let request = create_request(&workload, &node(), &resources).await.unwrap();

        assert_eq!(request.volumes.len(), 3);
        assert_eq!(request.volumes[0].volume_type, VOL_TYPE_EMPTY_DIR);
        assert_eq!(request.volumes[1].volume_type, VOL_TYPE_CONFIG_FILE);
        assert_eq!(request.volumes[1].config_file_to_paths[0].path, "app.yaml");
        assert_eq!(request.volumes[1].config_file_to_paths[0].content, "port: 80\n");
        assert_eq!(request.volumes[2].config_file_to_paths[0].content, "-----KEY-----");
        assert_eq!(request.owner_references["kind"], "ReplicaSet");
        assert_eq!(request.owner_references["name"], "web-5d8");
    }

    #[tokio::test]
    async fn required_missing_config_map_fails_the_translation() {
        let mut workload = pod(vec![container("app", "app")]);
        workload.spec.as_mut().unwrap().volumes = Some(vec![PodVolume {
            name: "settings".to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: Some("settings".to_string()),
                optional: Some(false),
                ..Default::default()
            }),
            ..Default::default()
        }]);
        let mut resources = MockResourceManager::new();
        resources.expect_get_config_map().returning(|_, _| Ok(None));

        let err = create_request(&workload, &node(), &resources)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "ConfigMap settings is required by Pod web and does not exist"
        );
    }

    #[tokio::test]
    async fn unsupported_volume_names_the_volume_and_pod() {
        let mut workload = pod(vec![container("app", "app")]);
        workload.spec.as_mut().unwrap().volumes = Some(vec![PodVolume {
            name: "mystery".to_string(),
            ..Default::default()
        }]);
        let resources = MockResourceManager::new();

        match create_request(&workload, &node(), &resources).await {
            Err(Error::UnsupportedVolume { volume, pod }) => {
                assert_eq!(volume, "mystery");
                assert_eq!(pod, "web");
            }
            other => panic!("expected unsupported volume, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn image_pull_secrets_become_registry_credentials() {
        let mut workload = pod(vec![container("app", "registry.example.com/app:1")]);
        workload.spec.as_mut().unwrap().image_pull_secrets = Some(vec![LocalObjectReference {
            name: Some("pull".to_string()),
        }]);
        let mut resources = MockResourceManager::new();
        resources
            .expect_get_secret()
            .with(eq("pull"), eq("ns"))
            .times(1)
            .returning(|_, _| {
                let payload = json!({"auths": {"registry.example.com": {"username": "u", "password": "p"}}});
                Ok(Some(Secret {
                    type_: Some("kubernetes.io/dockerconfigjson".to_string()),
                    data: Some(BTreeMap::from([(
                        ".dockerconfigjson".to_string(),
                        ByteString(payload.to_string().into_bytes()),
                    )])),
                    ..Default::default()
                }))
            });

        let request = create_request(&workload, &node(), &resources).await.unwrap();
        assert_eq!(
            request.image_registry_credentials,
            vec![ImageRegistryCredential {
                server: "registry.example.com".to_string(),
                username: "u".to_string(),
                password: "p".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn missing_pull_secret_is_an_error() {
        let mut workload = pod(vec![container("app", "app")]);
        workload.spec.as_mut().unwrap().image_pull_secrets = Some(vec![LocalObjectReference {
            name: Some("gone".to_string()),
        }]);
        let mut resources = MockResourceManager::new();
        resources.expect_get_secret().returning(|_, _| Ok(None));

        let err = create_request(&workload, &node(), &resources)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingResource { kind: "Secret", .. }));
    }
}
