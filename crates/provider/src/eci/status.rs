//! Remote container group → pod status translation.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use k8s_openapi::api::core::v1::{
    Container, ContainerState as PodContainerState, ContainerStateRunning,
    ContainerStateTerminated, ContainerStateWaiting, ContainerStatus, Pod, PodCondition, PodSpec,
    PodStatus, ResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};

use super::types::{ContainerGroup, ContainerInfo, ContainerState, POD_TAG_TIME_FORMAT, TIME_FORMAT};

pub const INSTANCE_ID_ANNOTATION: &str = "eci-instance-id";

pub const PHASE_PENDING: &str = "Pending";
pub const PHASE_RUNNING: &str = "Running";
pub const PHASE_SUCCEEDED: &str = "Succeeded";
pub const PHASE_FAILED: &str = "Failed";
pub const PHASE_UNKNOWN: &str = "Unknown";

/// Map a vendor group or container state onto a pod phase.
pub fn pod_phase(state: &str) -> &'static str {
    match state {
        "Scheduling" | "Pending" => PHASE_PENDING,
        "Running" => PHASE_RUNNING,
        "Succeeded" => PHASE_SUCCEEDED,
        "ScheduleFailed" | "Failed" => PHASE_FAILED,
        _ => PHASE_UNKNOWN,
    }
}

/// Ready, Initialized and Scheduled are reported together, and only for
/// running or finished groups.
pub fn pod_conditions(state: &str, transition: Option<&Time>) -> Vec<PodCondition> {
    match pod_phase(state) {
        PHASE_RUNNING | PHASE_SUCCEEDED => ["Ready", "Initialized", "PodScheduled"]
            .into_iter()
            .map(|kind| PodCondition {
                type_: kind.to_string(),
                status: "True".to_string(),
                last_transition_time: transition.cloned(),
                ..Default::default()
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Translate a vendor container state.
///
/// A timestamp the state needs but that does not parse yields an empty state
/// instead of an error.
pub fn container_state(state: Option<&ContainerState>) -> PodContainerState {
    let Some(state) = state else {
        return PodContainerState::default();
    };

    match state.state.as_str() {
        "Running" | "Succeeded" => match parse_time(&state.start_time, TIME_FORMAT) {
            Some(started) => PodContainerState {
                running: Some(ContainerStateRunning {
                    started_at: Some(started),
                }),
                ..Default::default()
            },
            None => PodContainerState::default(),
        },
        "Failed" | "Canceled" => {
            let started = parse_time(&state.start_time, TIME_FORMAT);
            let finished = parse_time(&state.finish_time, TIME_FORMAT);
            match (started, finished) {
                (Some(started), Some(finished)) => PodContainerState {
                    terminated: Some(ContainerStateTerminated {
                        exit_code: state.exit_code,
                        reason: Some(state.state.clone()),
                        message: Some(state.detail_status.clone()),
                        started_at: Some(started),
                        finished_at: Some(finished),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                _ => PodContainerState::default(),
            }
        }
        _ => PodContainerState {
            waiting: Some(ContainerStateWaiting {
                reason: Some(state.state.clone()),
                message: Some(state.detail_status.clone()),
            }),
            ..Default::default()
        },
    }
}

fn container_status(info: &ContainerInfo) -> ContainerStatus {
    let ready = info
        .current_state
        .as_ref()
        .is_some_and(|s| pod_phase(&s.state) == PHASE_RUNNING);
    ContainerStatus {
        name: info.name.clone(),
        state: Some(container_state(info.current_state.as_ref())),
        last_state: Some(container_state(info.previous_state.as_ref())),
        ready,
        restart_count: info.restart_count,
        image: info.image.clone(),
        image_id: String::new(),
        container_id: (!info.id.is_empty()).then(|| info.id.clone()),
        ..Default::default()
    }
}

/// Status of a remote group as the orchestrator sees it.
pub fn container_group_status(group: &ContainerGroup) -> PodStatus {
    let created = parse_time(&group.creation_time, POD_TAG_TIME_FORMAT);
    let start_time = group
        .containers
        .first()
        .and_then(|c| c.current_state.as_ref())
        .and_then(|s| parse_time(&s.start_time, TIME_FORMAT));
    let address = (!group.intranet_ip.is_empty()).then(|| group.intranet_ip.clone());

    PodStatus {
        phase: Some(pod_phase(&group.status).to_string()),
        conditions: Some(pod_conditions(&group.status, created.as_ref())),
        message: (!group.task_state.is_empty()).then(|| group.task_state.clone()),
        host_ip: address.clone(),
        pod_ip: address,
        start_time,
        container_statuses: Some(group.containers.iter().map(container_status).collect()),
        ..Default::default()
    }
}

/// Rebuild the pod a remote group is running, bound to `node_name`.
pub fn container_group_to_pod(group: &ContainerGroup, node_name: &str) -> Pod {
    let containers = group
        .containers
        .iter()
        .map(|c| {
            let resources = BTreeMap::from([
                ("cpu".to_string(), cpu_quantity(c.cpu)),
                ("memory".to_string(), memory_quantity(c.memory)),
            ]);
            Container {
                name: c.name.clone(),
                image: Some(c.image.clone()),
                command: (!c.command.is_empty()).then(|| c.command.clone()),
                resources: Some(ResourceRequirements {
                    requests: Some(resources.clone()),
                    limits: Some(resources),
                    ..Default::default()
                }),
                ..Default::default()
            }
        })
        .collect();

    Pod {
        metadata: ObjectMeta {
            name: Some(group.pod_name.clone()),
            namespace: Some(group.namespace.clone()),
            uid: Some(group.container_group_id.clone()),
            creation_timestamp: parse_time(&group.creation_time, POD_TAG_TIME_FORMAT),
            annotations: Some(BTreeMap::from([(
                INSTANCE_ID_ANNOTATION.to_string(),
                group.container_group_id.clone(),
            )])),
            ..Default::default()
        },
        spec: Some(PodSpec {
            node_name: Some(node_name.to_string()),
            containers,
            ..Default::default()
        }),
        status: Some(container_group_status(group)),
    }
}

fn cpu_quantity(cores: f64) -> Quantity {
    Quantity(format!("{}m", (cores * 1000.0).round() as i64))
}

fn memory_quantity(gib: f64) -> Quantity {
    Quantity(format!("{}Mi", (gib * 1024.0).round() as i64))
}

fn parse_time(raw: &str, format: &str) -> Option<Time> {
    NaiveDateTime::parse_from_str(raw, format)
        .ok()
        .map(|naive| Time(utc(naive)))
}

fn utc(naive: NaiveDateTime) -> DateTime<Utc> {
    Utc.from_utc_datetime(&naive)
}
