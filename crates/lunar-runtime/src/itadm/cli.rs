use crate::command::{args, command_line, invoke, CommandRunner};
use crate::error::{Result, RuntimeError};
use crate::itadm::IscsiAdmin;
use async_trait::async_trait;
use lunar_core::{
    created_identifier, decode_target_port_groups, decode_targets, normalize_assignments,
    tokenize, Delimiter, Target, TargetPortGroup, TargetRequest,
};
use std::sync::Arc;
use tracing::info;

/// iSCSI administrator backed by the `itadm` command
pub struct ItadmCli {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl ItadmCli {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            program: "itadm".to_string(),
        }
    }

    async fn lines(&self, argv: &[String], kind: &str, target: &str) -> Result<Vec<String>> {
        invoke(self.runner.as_ref(), &self.program, argv)
            .await
            .map_err(|e| classify(e, kind, target))
    }

    async fn itadm(&self, argv: Vec<String>, kind: &str, target: &str) -> Result<Vec<Vec<String>>> {
        let lines = self.lines(&argv, kind, target).await?;
        Ok(tokenize(&lines, Delimiter::Whitespace))
    }

    async fn targets(&self, iqn: Option<&str>) -> Result<Vec<Target>> {
        let mut argv = args(["list-target", "-v"]);
        argv.extend(iqn.map(str::to_string));
        let cmd = command_line(&self.program, &argv);

        let lines = self.lines(&argv, "Target", iqn.unwrap_or_default()).await?;
        // only this listing prints defaulted values as `name = value`
        let rows = tokenize(&normalize_assignments(lines), Delimiter::Whitespace);
        Ok(decode_targets(&rows, &cmd)?)
    }

    async fn port_groups(&self, name: Option<&str>) -> Result<Vec<TargetPortGroup>> {
        let mut argv = args(["list-tpg", "-v"]);
        argv.extend(name.map(str::to_string));
        let cmd = command_line(&self.program, &argv);

        let rows = self
            .itadm(argv, "TargetPortGroup", name.unwrap_or_default())
            .await?;
        Ok(decode_target_port_groups(&rows, &cmd)?)
    }
}

/// Turn well-known `itadm` failures into typed errors
fn classify(err: RuntimeError, kind: &str, target: &str) -> RuntimeError {
    if let RuntimeError::CommandFailed { stderr, .. } = &err {
        if stderr.contains("not found") {
            return RuntimeError::not_found(kind, target);
        }
        if stderr.contains("already exists") {
            return RuntimeError::already_exists(kind, target);
        }
    }
    err
}

#[async_trait]
impl IscsiAdmin for ItadmCli {
    async fn list_target_port_groups(&self) -> Result<Vec<TargetPortGroup>> {
        self.port_groups(None).await
    }

    async fn get_target_port_group(&self, name: &str) -> Result<TargetPortGroup> {
        self.port_groups(Some(name))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RuntimeError::not_found("TargetPortGroup", name))
    }

    async fn create_target_port_group(
        &self,
        name: &str,
        portals: &[String],
    ) -> Result<TargetPortGroup> {
        info!("Creating target port group {} on {:?}", name, portals);
        let mut argv = args(["create-tpg", name]);
        argv.extend(portals.iter().cloned());

        self.itadm(argv, "TargetPortGroup", name).await?;
        info!("Target port group created: {}", name);
        self.get_target_port_group(name).await
    }

    async fn delete_target_port_group(&self, name: &str, force: bool) -> Result<()> {
        let mut argv = args(["delete-tpg"]);
        if force {
            argv.push("-f".to_string());
        }
        argv.push(name.to_string());

        self.itadm(argv, "TargetPortGroup", name).await?;
        info!("Target port group deleted: {}", name);
        Ok(())
    }

    async fn list_targets(&self) -> Result<Vec<Target>> {
        self.targets(None).await
    }

    async fn get_target(&self, iqn: &str) -> Result<Target> {
        self.targets(Some(iqn))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RuntimeError::not_found("Target", iqn))
    }

    async fn create_target(&self, request: &TargetRequest) -> Result<Target> {
        let mut argv = args(["create-target", "-a", "default"]);
        let flags = [
            ("-l", &request.alias),
            ("-n", &request.iqn),
            ("-t", &request.tpg),
        ];
        for (flag, value) in flags {
            if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
                argv.push(flag.to_string());
                argv.push(v.to_string());
            }
        }

        let cmd = command_line(&self.program, &argv);
        let requested = request.iqn.clone().unwrap_or_default();
        let rows = self.itadm(argv, "Target", &requested).await?;
        let iqn = created_identifier(&rows, "Target", &cmd)?;
        info!("Target created: {}", iqn);

        self.get_target(&iqn).await
    }

    async fn delete_target(&self, iqn: &str, force: bool) -> Result<()> {
        let mut argv = args(["delete-target"]);
        if force {
            argv.push("-f".to_string());
        }
        argv.push(iqn.to_string());

        self.itadm(argv, "Target", iqn).await?;
        info!("Target deleted: {}", iqn);
        Ok(())
    }
}
