//! Unseal Check
//!
//! Builds the unseal key service from `CRYPTOUTIL_` settings, runs a wrap/unwrap
//! and encrypt/decrypt self-test, reports the result and shuts the service down.
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


use anyhow::{ensure, Context, Result};
use cryptoutil_config::AppSettings;
use cryptoutil_logging::init_logging;
use cryptoutil_unseal::{Jwk, UnsealKeysService};
use tracing::{error, info};

const SELF_TEST_PAYLOAD: &[u8] = b"cryptoutil unseal self-test";

#[tokio::main]
async fn main() -> Result<()> {
    let settings = AppSettings::from_env().context("Failed to load configuration")?;
    init_logging("unseal-check", &settings.logging).context("Failed to initialize logging")?;

    info!(
        mode = %settings.unseal.mode,
        files = settings.unseal.files.len(),
        dev_mode = settings.unseal.dev_mode,
        "Configuration loaded"
    );

    let service = UnsealKeysService::from_settings(&settings.unseal)
        .await
        .context("Failed to build unseal key service")?;

    let outcome = self_test(&service).await;
    service.shutdown().await;

    match outcome {
        Ok(keys) => {
            info!(
                mode = %service.mode(),
                kind = service.mode().kind(),
                keys,
                "Unseal self-test passed"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Unseal self-test failed");
            Err(e)
        }
    }
}

async fn self_test(service: &UnsealKeysService) -> Result<usize> {
    let keys = service.key_ids().await?.len();

    let root = Jwk::generate_oct256(Some("unseal-check".to_string()))?;
    let wrapped = service.wrap_key(&root).await?;
    let unwrapped = service.unwrap_key(&wrapped).await?;
    ensure!(unwrapped == root, "unwrapped key does not match the wrapped key");

    let sealed = service.encrypt_data(SELF_TEST_PAYLOAD).await?;
    let opened = service.decrypt_data(&sealed).await?;
    ensure!(opened == SELF_TEST_PAYLOAD, "decrypted data does not match");

    Ok(keys)
}
