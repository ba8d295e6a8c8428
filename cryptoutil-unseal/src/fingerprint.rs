//! Machine fingerprint shares
//!
//! Collects host characteristics (architecture, OS, CPU identification, RAM,
//! hostname, host id, user identity) and turns each present field into one
//! 32-byte share. CPU queries can be slow on some platforms, so collection runs
//! on the blocking pool under a timeout.
// Copyright 2025 Francisco F. Pinochet
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


use crate::error::{UnsealError, UnsealResult};
use crate::key_types::RawShare;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::time::Duration;
use sysinfo::{System, Users};
use tracing::debug;

/// One collected characteristic: a fixed label and its value
pub type FingerprintField = (&'static str, String);

const HOST_ID_PATHS: [&str; 2] = ["/etc/machine-id", "/var/lib/dbus/machine-id"];

/// Collect fingerprint shares from the running system, bounded by `timeout`
pub async fn collect(timeout: Duration) -> UnsealResult<Vec<RawShare>> {
    collect_with(timeout, collect_system_fields).await
}

/// Run `collector` on the blocking pool and hash its fields into shares
pub async fn collect_with<F>(timeout: Duration, collector: F) -> UnsealResult<Vec<RawShare>>
where
    F: FnOnce() -> Result<Vec<FingerprintField>, String> + Send + 'static,
{
    let fields = match tokio::time::timeout(timeout, tokio::task::spawn_blocking(collector)).await
    {
        Ok(Ok(Ok(fields))) => fields,
        Ok(Ok(Err(e))) => return Err(UnsealError::SysInfoCollectionFailed(e)),
        Ok(Err(e)) => {
            return Err(UnsealError::SysInfoCollectionFailed(format!(
                "collector task failed: {}",
                e
            )))
        }
        Err(_) => {
            return Err(UnsealError::SysInfoCollectionFailed(format!(
                "timed out after {}ms",
                timeout.as_millis()
            )))
        }
    };

    let shares = fingerprint_shares(&fields);
    debug!(fields = fields.len(), shares = shares.len(), "Collected system fingerprint");
    Ok(shares)
}

/// Hash every non-empty field into a 32-byte share, keeping field order
pub fn fingerprint_shares(fields: &[FingerprintField]) -> Vec<RawShare> {
    fields
        .iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .map(|(label, value)| {
            let mut hasher = Sha256::new();
            hasher.update(label.as_bytes());
            hasher.update([0u8]);
            hasher.update(value.trim().as_bytes());
            hasher.finalize().to_vec()
        })
        .collect()
}

/// How many fingerprint shares must match: all but one, so a single field whose
/// value changes still yields a matching key. A field that disappears changes
/// the share count itself, and then no key matches.
pub fn fingerprint_choose_n(share_count: usize) -> usize {
    if share_count <= 1 {
        1
    } else {
        share_count - 1
    }
}

/// Blocking collection of host characteristics, in a fixed order
pub fn collect_system_fields() -> Result<Vec<FingerprintField>, String> {
    let mut sys = System::new();
    sys.refresh_cpu();
    sys.refresh_memory();

    let mut fields: Vec<FingerprintField> = vec![
        ("arch", std::env::consts::ARCH.to_string()),
        ("os", std::env::consts::OS.to_string()),
        ("cpu_count", sys.cpus().len().to_string()),
    ];

    let cpu_models: BTreeSet<String> = sys
        .cpus()
        .iter()
        .map(|cpu| format!("{} {}", cpu.vendor_id().trim(), cpu.brand().trim()))
        .collect();
    fields.push((
        "cpu_model",
        cpu_models.into_iter().collect::<Vec<_>>().join(";"),
    ));
    fields.push(("ram", sys.total_memory().to_string()));

    let hostname = hostname::get()
        .map_err(|e| format!("hostname lookup failed: {}", e))?
        .to_string_lossy()
        .to_string();
    fields.push(("hostname", hostname));
    fields.push(("host_id", read_host_id().unwrap_or_default()));

    let pid = sysinfo::get_current_pid().map_err(|e| format!("pid lookup failed: {}", e))?;
    sys.refresh_process(pid);
    if let Some(process) = sys.process(pid) {
        if let Some(uid) = process.user_id() {
            fields.push(("uid", format!("{:?}", uid)));
            let users = Users::new_with_refreshed_list();
            if let Some(user) = users.get_user_by_id(uid) {
                fields.push(("username", user.name().to_string()));
            }
        }
        if let Some(gid) = process.group_id() {
            fields.push(("gid", format!("{:?}", gid)));
        }
    }

    Ok(fields)
}

fn read_host_id() -> Option<String> {
    HOST_ID_PATHS
        .iter()
        .filter_map(|path| std::fs::read_to_string(path).ok())
        .map(|id| id.trim().to_string())
        .find(|id| !id.is_empty())
}
