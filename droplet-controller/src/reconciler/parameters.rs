//! Mapping between desired droplet parameters and the provider's shapes.

use crate::clients::{DropletCreateRequest, ObservedDroplet};
use crate::resource::DropletParameters;

fn late_init_string(current: &mut String, observed: Option<&str>) {
    if current.is_empty() {
        if let Some(v) = observed {
            *current = v.to_string();
        }
    }
}

fn late_init_option(current: &mut Option<String>, observed: Option<&str>) {
    if current.is_none() {
        *current = observed.map(str::to_string);
    }
}

fn late_init_vec(current: &mut Vec<String>, observed: &[String]) {
    if current.is_empty() && !observed.is_empty() {
        *current = observed.to_vec();
    }
}

fn late_init_flag(current: &mut Option<bool>, observed: bool) {
    if current.is_none() {
        *current = Some(observed);
    }
}

/// Fill parameters the record left unset with what the provider reports.
///
/// Fields the user set are never touched.
pub fn late_initialize(params: &mut DropletParameters, observed: &ObservedDroplet) {
    late_init_string(&mut params.region, observed.region.as_deref());
    late_init_string(&mut params.size, observed.size.as_deref());
    late_init_string(&mut params.image, observed.image.as_deref());
    late_init_vec(&mut params.volumes, &observed.volume_ids);
    late_init_vec(&mut params.tags, &observed.tags);
    late_init_option(&mut params.vpc_uuid, observed.vpc_uuid.as_deref());
    late_init_flag(&mut params.backups, observed.has_feature("backups"));
    late_init_flag(&mut params.ipv6, observed.has_feature("ipv6"));
    late_init_flag(
        &mut params.private_networking,
        observed.has_feature("private_networking"),
    );
    late_init_flag(&mut params.monitoring, observed.has_feature("monitoring"));
}

/// Build the create request for a droplet called `name`.
pub fn create_request(name: &str, params: &DropletParameters) -> DropletCreateRequest {
    DropletCreateRequest {
        name: name.to_string(),
        region: params.region.clone(),
        size: params.size.clone(),
        image: params.image.clone(),
        ssh_keys: params.ssh_keys.clone(),
        backups: params.backups.unwrap_or(false),
        ipv6: params.ipv6.unwrap_or(false),
        private_networking: params.private_networking.unwrap_or(false),
        monitoring: params.monitoring.unwrap_or(false),
        volumes: params.volumes.clone(),
        tags: params.tags.clone(),
        user_data: params.user_data.clone(),
        vpc_uuid: params.vpc_uuid.clone(),
    }
}
