use crate::command::{args, command_line, invoke, CommandRunner};
use crate::error::{Result, RuntimeError};
use crate::stmf::{LuOptions, StmfConfig, TargetFramework};
use async_trait::async_trait;
use lunar_core::{
    created_identifier, decode_host_groups, decode_logical_units, decode_target_groups,
    decode_views, device_path, tokenize, Delimiter, HostGroup, LogicalUnit, TargetGroup, View,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Target framework backed by `stmfadm` (and the HA administrator when enabled)
pub struct StmfCli {
    runner: Arc<dyn CommandRunner>,
    program: String,
    config: StmfConfig,
}

impl StmfCli {
    pub fn new(runner: Arc<dyn CommandRunner>, config: StmfConfig) -> Self {
        Self {
            runner,
            program: "stmfadm".to_string(),
            config,
        }
    }

    /// Program that applies host/target group changes
    fn group_admin(&self) -> &str {
        if self.config.ha_enabled {
            &self.config.ha_admin
        } else {
            &self.program
        }
    }

    async fn run(
        &self,
        program: &str,
        argv: Vec<String>,
        kind: &str,
        target: &str,
    ) -> Result<Vec<Vec<String>>> {
        let lines = invoke(self.runner.as_ref(), program, &argv)
            .await
            .map_err(|e| classify(e, kind, target))?;
        Ok(tokenize(&lines, Delimiter::COLON))
    }

    async fn stmfadm(&self, argv: Vec<String>, kind: &str, target: &str) -> Result<Vec<Vec<String>>> {
        self.run(&self.program, argv, kind, target).await
    }

    async fn group_change(&self, argv: Vec<String>, kind: &str, target: &str) -> Result<()> {
        self.run(self.group_admin(), argv, kind, target).await?;
        Ok(())
    }
}

/// Turn well-known `stmfadm` failures into typed errors
///
/// Only failures whose stderr names `target` are rewritten. Anything else,
/// such as a missing host group during `add-view`, stays `CommandFailed`
/// with its command line and stderr.
fn classify(err: RuntimeError, kind: &str, target: &str) -> RuntimeError {
    if let RuntimeError::CommandFailed { stderr, .. } = &err {
        if target.is_empty() || !names_target(stderr, target) {
            return err;
        }
        if stderr.contains("not found") {
            return RuntimeError::not_found(kind, target);
        }
        if stderr.contains("already exists") {
            return RuntimeError::already_exists(kind, target);
        }
    }
    err
}

/// Whether `target` appears in stderr as a whole `:`/whitespace separated word
fn names_target(stderr: &str, target: &str) -> bool {
    stderr
        .split(|c: char| c == ':' || c.is_whitespace())
        .any(|word| word == target)
}

#[async_trait]
impl TargetFramework for StmfCli {
    async fn list_logical_units(&self) -> Result<Vec<LogicalUnit>> {
        let argv = args(["list-lu", "-v"]);
        let cmd = command_line(&self.program, &argv);
        let rows = self.stmfadm(argv, "LogicalUnit", "").await?;
        Ok(decode_logical_units(&rows, &cmd)?)
    }

    async fn get_logical_unit(&self, id: &str) -> Result<LogicalUnit> {
        let argv = args(["list-lu", "-v", id]);
        let cmd = command_line(&self.program, &argv);
        let rows = self.stmfadm(argv, "LogicalUnit", id).await?;
        decode_logical_units(&rows, &cmd)?
            .into_iter()
            .next()
            .ok_or_else(|| RuntimeError::not_found("LogicalUnit", id))
    }

    async fn create_logical_unit(&self, dataset: &str, options: &LuOptions) -> Result<LogicalUnit> {
        info!("Creating logical unit on {}", dataset);
        let mut argv = args(["create-lu", "-p"]);
        argv.push(format!("blk={}", options.block_size));
        for (key, value) in [
            ("guid", &options.guid),
            ("alias", &options.alias),
            ("serial", &options.serial),
        ] {
            if let Some(v) = value {
                argv.push("-p".to_string());
                argv.push(format!("{}={}", key, v));
            }
        }
        argv.push(device_path(dataset));

        let cmd = command_line(&self.program, &argv);
        let rows = self.stmfadm(argv, "LogicalUnit", dataset).await?;
        let id = created_identifier(&rows, "LogicalUnit", &cmd)?;
        info!("Logical unit created: {} on {}", id, dataset);

        self.get_logical_unit(&id).await
    }

    async fn delete_logical_unit(&self, id: &str, keep_views: bool) -> Result<()> {
        let mut argv = args(["delete-lu"]);
        if keep_views {
            argv.push("-k".to_string());
        }
        argv.push(id.to_string());

        self.stmfadm(argv, "LogicalUnit", id).await?;
        info!("Logical unit deleted: {} (keep views: {})", id, keep_views);
        Ok(())
    }

    async fn online_logical_unit(&self, id: &str) -> Result<()> {
        self.stmfadm(args(["online-lu", id]), "LogicalUnit", id)
            .await?;
        info!("Logical unit online: {}", id);
        Ok(())
    }

    async fn offline_logical_unit(&self, id: &str) -> Result<()> {
        self.stmfadm(args(["offline-lu", id]), "LogicalUnit", id)
            .await?;
        info!("Logical unit offline: {}", id);
        Ok(())
    }

    async fn modify_logical_unit(
        &self,
        id: &str,
        alias: Option<&str>,
        size: Option<u64>,
    ) -> Result<()> {
        if alias.is_none() && size.is_none() {
            return Ok(());
        }

        let mut argv = args(["modify-lu"]);
        if let Some(alias) = alias {
            argv.push("-p".to_string());
            argv.push(format!("alias={}", alias));
        }
        if let Some(size) = size {
            argv.push("-s".to_string());
            argv.push(size.to_string());
        }
        argv.push(id.to_string());

        self.stmfadm(argv, "LogicalUnit", id).await?;
        info!("Logical unit modified: {}", id);
        Ok(())
    }

    async fn add_view(
        &self,
        id: &str,
        host_group: &str,
        target_group: &str,
        lun: Option<u16>,
    ) -> Result<()> {
        let mut argv = args(["add-view"]);
        if !host_group.is_empty() {
            argv.push("-h".to_string());
            argv.push(host_group.to_string());
        }
        if !target_group.is_empty() {
            argv.push("-t".to_string());
            argv.push(target_group.to_string());
        }
        if let Some(lun) = lun {
            argv.push("-n".to_string());
            argv.push(lun.to_string());
        }
        argv.push(id.to_string());

        self.stmfadm(argv, "LogicalUnit", id).await?;
        info!("View added to {}", id);
        Ok(())
    }

    async fn list_views(&self, id: &str) -> Result<Vec<View>> {
        let argv = args(["list-view", "-l", id]);
        let cmd = command_line(&self.program, &argv);

        match invoke(self.runner.as_ref(), &self.program, &argv).await {
            Ok(lines) => Ok(decode_views(&tokenize(&lines, Delimiter::COLON), &cmd)?),
            // a unit without views is reported as a failure
            Err(RuntimeError::CommandFailed { stderr, .. }) if stderr.contains("no views found") => {
                debug!("No views on {}", id);
                Ok(Vec::new())
            }
            Err(e) => Err(classify(e, "LogicalUnit", id)),
        }
    }

    async fn remove_view(&self, id: &str, entry: u16) -> Result<()> {
        let entry_arg = entry.to_string();
        self.stmfadm(
            args(["remove-view", "-l", id, entry_arg.as_str()]),
            "View",
            &format!("{}/{}", id, entry),
        )
        .await?;
        info!("View {} removed from {}", entry, id);
        Ok(())
    }

    async fn remove_all_views(&self, id: &str) -> Result<()> {
        self.stmfadm(args(["remove-view", "-a", "-l", id]), "LogicalUnit", id)
            .await?;
        info!("All views removed from {}", id);
        Ok(())
    }

    async fn list_host_groups(&self) -> Result<Vec<HostGroup>> {
        let rows = self
            .stmfadm(args(["list-hg", "-v"]), "HostGroup", "")
            .await?;
        Ok(decode_host_groups(&rows))
    }

    async fn get_host_group(&self, name: &str) -> Result<HostGroup> {
        let rows = self
            .stmfadm(args(["list-hg", "-v", name]), "HostGroup", name)
            .await?;
        decode_host_groups(&rows)
            .into_iter()
            .next()
            .ok_or_else(|| RuntimeError::not_found("HostGroup", name))
    }

    async fn create_host_group(&self, name: &str) -> Result<()> {
        self.group_change(args(["create-hg", name]), "HostGroup", name)
            .await?;
        info!("Host group created: {}", name);
        Ok(())
    }

    async fn delete_host_group(&self, name: &str) -> Result<()> {
        self.group_change(args(["delete-hg", name]), "HostGroup", name)
            .await?;
        info!("Host group deleted: {}", name);
        Ok(())
    }

    async fn add_host_group_member(&self, group: &str, member: &str, force: bool) -> Result<()> {
        let mut argv = args(["add-hg-member", "-g", group]);
        if force {
            argv.push("-F".to_string());
        }
        argv.push(member.to_string());

        self.group_change(argv, "HostGroup", group).await?;
        info!("Added {} to host group {}", member, group);
        Ok(())
    }

    async fn remove_host_group_member(&self, group: &str, member: &str) -> Result<()> {
        self.group_change(
            args(["remove-hg-member", "-g", group, member]),
            "HostGroup",
            group,
        )
        .await?;
        info!("Removed {} from host group {}", member, group);
        Ok(())
    }

    async fn list_target_groups(&self) -> Result<Vec<TargetGroup>> {
        let rows = self
            .stmfadm(args(["list-tg", "-v"]), "TargetGroup", "")
            .await?;
        Ok(decode_target_groups(&rows))
    }

    async fn get_target_group(&self, name: &str) -> Result<TargetGroup> {
        let rows = self
            .stmfadm(args(["list-tg", "-v", name]), "TargetGroup", name)
            .await?;
        decode_target_groups(&rows)
            .into_iter()
            .next()
            .ok_or_else(|| RuntimeError::not_found("TargetGroup", name))
    }

    async fn create_target_group(&self, name: &str) -> Result<()> {
        self.group_change(args(["create-tg", name]), "TargetGroup", name)
            .await?;
        info!("Target group created: {}", name);
        Ok(())
    }

    async fn delete_target_group(&self, name: &str) -> Result<()> {
        self.group_change(args(["delete-tg", name]), "TargetGroup", name)
            .await?;
        info!("Target group deleted: {}", name);
        Ok(())
    }

    async fn add_target_group_member(&self, group: &str, member: &str) -> Result<()> {
        self.group_change(
            args(["add-tg-member", "-g", group, member]),
            "TargetGroup",
            group,
        )
        .await?;
        info!("Added {} to target group {}", member, group);
        Ok(())
    }

    async fn remove_target_group_member(&self, group: &str, member: &str) -> Result<()> {
        self.group_change(
            args(["remove-tg-member", "-g", group, member]),
            "TargetGroup",
            group,
        )
        .await?;
        info!("Removed {} from target group {}", member, group);
        Ok(())
    }

    async fn backup_configuration(&self, pool: &str) -> Result<()> {
        if !self.config.ha_enabled {
            debug!("HA disabled, skipping configuration backup for {}", pool);
            return Ok(());
        }

        let argv = args(["backup", pool]);
        invoke(self.runner.as_ref(), &self.config.ha_admin, &argv).await?;
        info!("Target framework configuration backed up for pool {}", pool);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;
    use lunar_core::OperationalStatus;

    const LU_VOL1: &str = "LU Name: 600144F0B5B2A1C200005C2A7E2B0001
    Operational Status: Online
    Provider Name     : sbd
    Alias             : vol1
    View Entry Count  : 0
    Data File         : /dev/zvol/rdsk/tank/dom/proj/vol1
    Meta File         : not set
    Size              : 268435456
    Block Size        : 4096
    Management URL    : not set
    Vendor ID         : SUN
    Product ID        : COMSTAR
    Serial Num        : 0b7f0c0e-3b35-4bb0-9d1c-2f1f6c1c9a10
    Write Protect     : Disabled
    Writeback Cache   : Enabled
    Access State      : Active
";

    fn cli(ha_enabled: bool) -> (Arc<ScriptedRunner>, StmfCli) {
        let runner = Arc::new(ScriptedRunner::new());
        let config = StmfConfig {
            ha_enabled,
            ..Default::default()
        };
        (runner.clone(), StmfCli::new(runner, config))
    }

    #[tokio::test]
    async fn test_create_logical_unit_reads_back_record() {
        let (runner, stmf) = cli(false);
        runner.push_output("Logical unit created: 600144F0B5B2A1C200005C2A7E2B0001\n");
        runner.push_output(LU_VOL1);

        let options = LuOptions::default()
            .with_alias("vol1")
            .with_serial("0b7f0c0e-3b35-4bb0-9d1c-2f1f6c1c9a10");
        let lu = stmf
            .create_logical_unit("tank/dom/proj/vol1", &options)
            .await
            .unwrap();

        assert_eq!(lu.id, "600144F0B5B2A1C200005C2A7E2B0001");
        assert_eq!(lu.backing_store, "tank/dom/proj/vol1");
        assert_eq!(lu.operational_status, OperationalStatus::Online);
        assert_eq!(
            runner.calls(),
            vec![
                "stmfadm create-lu -p blk=4096 -p alias=vol1 -p serial=0b7f0c0e-3b35-4bb0-9d1c-2f1f6c1c9a10 /dev/zvol/rdsk/tank/dom/proj/vol1",
                "stmfadm list-lu -v 600144F0B5B2A1C200005C2A7E2B0001",
            ]
        );
    }

    #[tokio::test]
    async fn test_recreate_with_guid() {
        let (runner, stmf) = cli(false);
        runner.push_output("Logical unit created: 600144F0B5B2A1C200005C2A7E2B0001\n");
        runner.push_output(LU_VOL1);

        let options = LuOptions::default()
            .with_guid("600144F0B5B2A1C200005C2A7E2B0001")
            .with_alias("vol1");
        stmf.create_logical_unit("tank/dom/proj/vol1", &options)
            .await
            .unwrap();
        assert_eq!(
            runner.calls()[0],
            "stmfadm create-lu -p blk=4096 -p guid=600144F0B5B2A1C200005C2A7E2B0001 -p alias=vol1 /dev/zvol/rdsk/tank/dom/proj/vol1"
        );
    }

    #[tokio::test]
    async fn test_unknown_unit_is_not_found() {
        let (runner, stmf) = cli(false);
        runner.push_failure(1, "stmfadm: 600144F0DEADBEEF: not found\n");
        let err = stmf.get_logical_unit("600144F0DEADBEEF").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_and_modify_arguments() {
        let (runner, stmf) = cli(false);
        stmf.delete_logical_unit("LU1", true).await.unwrap();
        stmf.delete_logical_unit("LU1", false).await.unwrap();
        stmf.modify_logical_unit("LU1", None, Some(536_870_912))
            .await
            .unwrap();
        stmf.modify_logical_unit("LU1", Some("renamed"), None)
            .await
            .unwrap();
        // nothing to change: no invocation
        stmf.modify_logical_unit("LU1", None, None).await.unwrap();

        assert_eq!(
            runner.calls(),
            vec![
                "stmfadm delete-lu -k LU1",
                "stmfadm delete-lu LU1",
                "stmfadm modify-lu -s 536870912 LU1",
                "stmfadm modify-lu -p alias=renamed LU1",
            ]
        );
    }

    #[tokio::test]
    async fn test_view_arguments() {
        let (runner, stmf) = cli(false);
        stmf.add_view("LU1", "hg1", "tg1", Some(3)).await.unwrap();
        stmf.add_view("LU1", "", "", None).await.unwrap();
        stmf.remove_view("LU1", 2).await.unwrap();
        stmf.remove_all_views("LU1").await.unwrap();

        assert_eq!(
            runner.calls(),
            vec![
                "stmfadm add-view -h hg1 -t tg1 -n 3 LU1",
                "stmfadm add-view LU1",
                "stmfadm remove-view -l LU1 2",
                "stmfadm remove-view -a -l LU1",
            ]
        );
    }

    #[tokio::test]
    async fn test_list_views_without_views_is_empty() {
        let (runner, stmf) = cli(false);
        runner.push_failure(1, "stmfadm: LU1: no views found\n");
        assert!(stmf.list_views("LU1").await.unwrap().is_empty());

        runner.push_output(
            "View Entry: 0\n    Host group   : hg1\n    Target Group : tg1\n    LUN          : 0\n",
        );
        let views = stmf.list_views("LU1").await.unwrap();
        assert_eq!(views.len(), 1);
        assert!(views[0].matches("hg1", "tg1"));
    }

    #[tokio::test]
    async fn test_group_changes_use_stmfadm_without_ha() {
        let (runner, stmf) = cli(false);
        stmf.create_host_group("hg1").await.unwrap();
        stmf.add_host_group_member("hg1", "iqn.1986-03.com.sun:01:abc", true)
            .await
            .unwrap();
        stmf.create_target_group("tg1").await.unwrap();
        stmf.add_target_group_member("tg1", "iqn.2010-08.org.illumos:02:t1")
            .await
            .unwrap();
        stmf.backup_configuration("tank").await.unwrap();

        assert_eq!(
            runner.calls(),
            vec![
                "stmfadm create-hg hg1",
                "stmfadm add-hg-member -g hg1 -F iqn.1986-03.com.sun:01:abc",
                "stmfadm create-tg tg1",
                "stmfadm add-tg-member -g tg1 iqn.2010-08.org.illumos:02:t1",
            ]
        );
    }

    #[tokio::test]
    async fn test_group_changes_use_ha_admin() {
        let (runner, stmf) = cli(true);
        stmf.delete_host_group("hg1").await.unwrap();
        stmf.remove_target_group_member("tg1", "iqn.2010-08.org.illumos:02:t1")
            .await
            .unwrap();
        stmf.backup_configuration("tank").await.unwrap();
        // reads still go to stmfadm
        runner.push_output("Host Group: hg2\n");
        stmf.get_host_group("hg2").await.unwrap();

        assert_eq!(
            runner.calls(),
            vec![
                "/opt/HAC/RSF-1/bin/stmfha delete-hg hg1",
                "/opt/HAC/RSF-1/bin/stmfha remove-tg-member -g tg1 iqn.2010-08.org.illumos:02:t1",
                "/opt/HAC/RSF-1/bin/stmfha backup tank",
                "stmfadm list-hg -v hg2",
            ]
        );
    }

    #[tokio::test]
    async fn test_existing_group_is_already_exists() {
        let (runner, stmf) = cli(false);
        runner.push_failure(1, "stmfadm: hg1: already exists\n");
        let err = stmf.create_host_group("hg1").await.unwrap_err();
        assert!(matches!(err, RuntimeError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_add_view_keeps_stderr_for_missing_group() {
        let runner = Arc::new(ScriptedRunner::new());
        let stmf = StmfCli::new(runner.clone(), StmfConfig::default());

        runner.push_failure(1, "stmfadm: hg9: not found\n");
        let err = stmf
            .add_view("600144F0AAAA", "hg9", "", None)
            .await
            .unwrap_err();
        match err {
            RuntimeError::CommandFailed {
                command, stderr, ..
            } => {
                assert_eq!(command, "stmfadm add-view -h hg9 600144F0AAAA");
                assert!(stderr.contains("hg9: not found"));
            }
            other => panic!("unexpected error: {other}"),
        }

        // the unit itself missing is still typed
        runner.push_failure(1, "stmfadm: 600144F0AAAA: not found\n");
        assert!(stmf
            .add_view("600144F0AAAA", "", "", None)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_list_target_groups() {
        let (runner, stmf) = cli(false);
        runner.push_output(
            "Target Group: tg1\n        Member: iqn.2010-08.org.illumos:02:t1\nTarget Group: tg2\n",
        );
        let groups = stmf.list_target_groups().await.unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].members, vec!["iqn.2010-08.org.illumos:02:t1"]);
        assert_eq!(runner.calls(), vec!["stmfadm list-tg -v"]);
    }
}
