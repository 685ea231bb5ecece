/*!
 * PowerShell Query Backend
 * PnP device inventory and property store via Get-PnpDevice
 */

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

use super::{
    parse_battery_level, parse_endpoint_lines, parse_instance_id, parse_name_list, AudioEndpoint,
    DeviceQuery, BATTERY_PROPERTY_KEY, BLUETOOTH_INSTANCE_PREFIX,
};
use crate::error::QueryError;

pub struct PowerShellQuery {
    program: String,
}

impl PowerShellQuery {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, script: &str) -> Result<String, QueryError> {
        tracing::debug!("Running {} script: {}", self.program, script);

        let output = Command::new(&self.program)
            .args(["-NoProfile", "-NonInteractive", "-Command", script])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| QueryError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(QueryError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for PowerShellQuery {
    fn default() -> Self {
        Self::new("powershell")
    }
}

/// Single-quoted PowerShell literal.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn device_names_script() -> String {
    format!(
        "Get-PnpDevice -Class 'Bluetooth' \
         | Where-Object {{ $_.InstanceId -like {} }} \
         | Select-Object -ExpandProperty FriendlyName -Unique \
         | ForEach-Object {{ Write-Output $_ }}",
        quote(&format!("{}*", BLUETOOTH_INSTANCE_PREFIX)),
    )
}

fn audio_endpoints_script() -> &'static str {
    "Get-PnpDevice \
     | Where-Object { $_.Class -eq 'AudioEndpoint' } \
     | ForEach-Object { \"$($_.FriendlyName)`t$($_.Status)\" }"
}

fn resolve_instance_id_script(name: &str) -> String {
    format!(
        "$pattern = '*' + [WildcardPattern]::Escape({name}) + '*'; \
         Get-PnpDevice | Where-Object {{ $_.FriendlyName -like $pattern }} \
         | ForEach-Object {{ \
             $property = $_ | Get-PnpDeviceProperty -KeyName {key} | Where-Object Type -ne Empty; \
             if ($property) {{ $property.InstanceId }} \
         }}",
        name = quote(name),
        key = quote(BATTERY_PROPERTY_KEY),
    )
}

fn battery_level_script(instance_id: &str) -> String {
    format!(
        "Get-PnpDeviceProperty -InstanceId {id} -KeyName {key} | ForEach-Object {{ $_.Data }}",
        id = quote(instance_id),
        key = quote(BATTERY_PROPERTY_KEY),
    )
}

#[async_trait]
impl DeviceQuery for PowerShellQuery {
    async fn bluetooth_device_names(&self) -> Result<Vec<String>, QueryError> {
        let output = self.run(&device_names_script()).await?;
        Ok(parse_name_list(&output))
    }

    async fn audio_endpoints(&self) -> Result<Vec<AudioEndpoint>, QueryError> {
        let output = self.run(audio_endpoints_script()).await?;
        Ok(parse_endpoint_lines(&output))
    }

    async fn resolve_instance_id(&self, name: &str) -> Result<String, QueryError> {
        let output = self.run(&resolve_instance_id_script(name)).await?;
        Ok(parse_instance_id(&output))
    }

    async fn battery_level(&self, instance_id: &str) -> Result<u8, QueryError> {
        let output = self.run(&battery_level_script(instance_id)).await?;
        parse_battery_level(&output)
    }
}
