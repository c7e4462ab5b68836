use crate::command::{args, command_line, invoke, CommandRunner};
use crate::error::{Result, RuntimeError};
use crate::zfs::{DatasetManager, DestroyOptions, PropertyList, VolumeSpec};
use async_trait::async_trait;
use lunar_core::{
    decode_properties, split_pairs, tokenize, types::parse_dataset_kind, Dataset, DatasetKind,
    DatasetProperties, DecodeRules, Delimiter, LunarError,
};
use std::sync::Arc;
use tracing::info;

/// Dataset manager backed by the `zfs` command
pub struct ZfsCli {
    runner: Arc<dyn CommandRunner>,
    program: String,
    rules: DecodeRules,
}

impl ZfsCli {
    pub fn new(runner: Arc<dyn CommandRunner>, rules: DecodeRules) -> Self {
        Self {
            runner,
            program: "zfs".to_string(),
            rules,
        }
    }

    async fn zfs(&self, argv: Vec<String>, target: &str) -> Result<Vec<Vec<String>>> {
        let lines = self.zfs_lines(argv, target).await?;
        Ok(tokenize(&lines, Delimiter::Whitespace))
    }

    async fn zfs_lines(&self, argv: Vec<String>, target: &str) -> Result<Vec<String>> {
        invoke(self.runner.as_ref(), &self.program, &argv)
            .await
            .map_err(|e| classify(e, target))
    }
}

/// Turn well-known `zfs` failures into typed errors
fn classify(err: RuntimeError, target: &str) -> RuntimeError {
    if let RuntimeError::CommandFailed { stderr, .. } = &err {
        if stderr.contains("dataset does not exist") {
            return RuntimeError::not_found("Dataset", target);
        }
        if stderr.contains("dataset already exists") {
            return RuntimeError::already_exists("Dataset", target);
        }
    }
    err
}

fn push_properties(argv: &mut Vec<String>, properties: &PropertyList) {
    for (name, value) in properties {
        argv.push("-o".to_string());
        argv.push(format!("{}={}", name, value));
    }
}

#[async_trait]
impl DatasetManager for ZfsCli {
    async fn list(
        &self,
        kind: DatasetKind,
        base: &str,
        recursive: bool,
        depth: Option<u32>,
    ) -> Result<Vec<Dataset>> {
        let mut argv = args(["list", "-H", "-t", kind.as_str(), "-o", "name,type"]);
        if recursive {
            argv.push("-r".to_string());
        }
        if let Some(d) = depth {
            argv.push("-d".to_string());
            argv.push(d.to_string());
        }
        if !base.is_empty() {
            argv.push(base.to_string());
        }

        let cmd = command_line(&self.program, &argv);
        let rows = self.zfs(argv, base).await?;

        rows.into_iter()
            .filter(|row| !row.is_empty())
            .map(|row| -> Result<Dataset> {
                match row.as_slice() {
                    [name, ty, ..] => Ok(Dataset::new(name.clone(), parse_dataset_kind(ty, &cmd)?)),
                    _ => Err(LunarError::decode_failed(
                        "Dataset",
                        cmd.as_str(),
                        format!("expected name and type, got {:?}", row),
                    )
                    .into()),
                }
            })
            .collect()
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        match self.zfs(args(["list", "-H", "-o", "name", name]), name).await {
            Ok(_) => Ok(true),
            Err(RuntimeError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_filesystem(
        &self,
        name: &str,
        quota: u64,
        properties: &PropertyList,
    ) -> Result<Dataset> {
        info!("Creating filesystem {} (quota={})", name, quota);
        let mut argv = args(["create", "-o"]);
        argv.push(format!("quota={}", quota));
        push_properties(&mut argv, properties);
        argv.push(name.to_string());

        self.zfs(argv, name).await?;
        info!("Filesystem created: {}", name);
        self.get(name).await
    }

    async fn create_volume(&self, name: &str, spec: &VolumeSpec) -> Result<Dataset> {
        info!("Creating volume {} (volsize={})", name, spec.size);
        let mut argv = args(["create", "-V"]);
        argv.push(spec.size.to_string());
        if spec.sparse {
            argv.push("-s".to_string());
        }
        push_properties(&mut argv, &spec.properties);
        argv.push(name.to_string());

        self.zfs(argv, name).await?;
        info!("Volume created: {}", name);
        self.get(name).await
    }

    async fn clone_snapshot(
        &self,
        snapshot: &str,
        clone: &str,
        properties: &PropertyList,
    ) -> Result<Dataset> {
        info!("Cloning {} into {}", snapshot, clone);
        let mut argv = args(["clone"]);
        push_properties(&mut argv, properties);
        argv.push(snapshot.to_string());
        argv.push(clone.to_string());

        self.zfs(argv, snapshot).await?;
        info!("Clone created: {}", clone);
        self.get(clone).await
    }

    async fn snapshot(&self, dataset: &str, snapshot: &str) -> Result<Dataset> {
        let snap = format!("{}@{}", dataset, snapshot);
        self.zfs(args(["snapshot", snap.as_str()]), dataset).await?;
        info!("Snapshot created: {}", snap);
        self.get(&snap).await
    }

    async fn rollback(&self, snapshot: &str) -> Result<()> {
        info!("Rolling back to {}", snapshot);
        self.zfs(args(["rollback", snapshot]), snapshot).await?;
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        self.zfs(args(["rename", from, to]), from).await?;
        info!("Dataset renamed: {} -> {}", from, to);
        Ok(())
    }

    async fn promote(&self, name: &str) -> Result<()> {
        self.zfs(args(["promote", name]), name).await?;
        info!("Dataset promoted: {}", name);
        Ok(())
    }

    async fn destroy(&self, name: &str, options: DestroyOptions) -> Result<()> {
        info!("Destroying dataset: {}", name);
        let mut argv = args(["destroy"]);
        if options.recursive {
            argv.push("-r".to_string());
        }
        if options.dependents {
            argv.push("-R".to_string());
        }
        argv.push(name.to_string());

        self.zfs(argv, name).await?;
        info!("Dataset destroyed: {}", name);
        Ok(())
    }

    async fn properties(&self, name: &str) -> Result<DatasetProperties> {
        let argv = args(["get", "-Hp", "-o", "property,value", "all", name]);
        let cmd = command_line(&self.program, &argv);
        // values are free text; only the first tab ends the property name
        let lines = self.zfs_lines(argv, name).await?;
        let rows = split_pairs(&lines, Delimiter::Whitespace);
        Ok(decode_properties(&rows, &self.rules, &cmd)?)
    }

    async fn set_property(&self, name: &str, property: &str, value: &str) -> Result<()> {
        let assignment = format!("{}={}", property, value);
        self.zfs(args(["set", assignment.as_str(), name]), name)
            .await?;
        info!("Set {} on {}", assignment, name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;

    const VOLUME_DUMP: &str = "type\tvolume\nvolsize\t268435456\nvolblocksize\t8192\ncompression\tlz4\ncustom:alias\tvol1\n";

    fn cli() -> (Arc<ScriptedRunner>, ZfsCli) {
        let runner = Arc::new(ScriptedRunner::new());
        let zfs = ZfsCli::new(runner.clone(), DecodeRules::default());
        (runner, zfs)
    }

    #[tokio::test]
    async fn test_list_flags_and_decode() {
        let (runner, zfs) = cli();
        runner.push_output("tank/dom/proj/vol1@s1\tsnapshot\ntank/dom/proj/vol1@s2\tsnapshot\n");

        let snaps = zfs
            .list(DatasetKind::Snapshot, "tank/dom/proj/vol1", true, Some(1))
            .await
            .unwrap();
        assert_eq!(snaps.len(), 2);
        assert_eq!(snaps[0].kind, DatasetKind::Snapshot);
        assert_eq!(snaps[1].snapshot_name(), Some("s2"));
        assert_eq!(
            runner.calls(),
            vec!["zfs list -H -t snapshot -o name,type -r -d 1 tank/dom/proj/vol1"]
        );
    }

    #[tokio::test]
    async fn test_list_rejects_short_rows() {
        let (runner, zfs) = cli();
        runner.push_output("tank/dom\n");
        let err = zfs
            .list(DatasetKind::Filesystem, "tank", false, None)
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Core(LunarError::DecodeFailed { .. })));
    }

    #[tokio::test]
    async fn test_create_volume_arguments() {
        let (runner, zfs) = cli();
        runner.push_output("");
        runner.push_output(VOLUME_DUMP);

        let spec = VolumeSpec::new(268_435_456)
            .sparse(true)
            .property("volblocksize", "8192")
            .property("compression", "lz4")
            .property("custom:sflag", "managed_by_lunar");
        let ds = zfs.create_volume("tank/dom/proj/vol1", &spec).await.unwrap();

        assert_eq!(ds.kind, DatasetKind::Volume);
        let props = ds.properties.unwrap();
        assert_eq!(props.as_volume().unwrap().volsize, 268_435_456);
        assert_eq!(
            runner.calls(),
            vec![
                "zfs create -V 268435456 -s -o volblocksize=8192 -o compression=lz4 -o custom:sflag=managed_by_lunar tank/dom/proj/vol1",
                "zfs get -Hp -o property,value all tank/dom/proj/vol1",
            ]
        );
    }

    #[tokio::test]
    async fn test_properties_keep_spacing_inside_values() {
        let (runner, zfs) = cli();
        runner.push_output("type\tvolume\nvolsize\t268435456\ncustom:alias\tweb  tier   one\n");

        let props = zfs.properties("tank/dom/proj/vol1").await.unwrap();
        assert_eq!(props.as_volume().unwrap().alias, "web  tier   one");
    }

    #[tokio::test]
    async fn test_create_filesystem_quota_first() {
        let (runner, zfs) = cli();
        runner.push_output("");
        runner.push_output("type\tfilesystem\nquota\t524288000\n");

        let props = vec![("custom:alias".to_string(), "web".to_string())];
        let ds = zfs
            .create_filesystem("tank/dom/web", 524_288_000, &props)
            .await
            .unwrap();
        assert_eq!(
            ds.properties.unwrap().as_filesystem().unwrap().quota,
            524_288_000
        );
        assert_eq!(
            runner.calls()[0],
            "zfs create -o quota=524288000 -o custom:alias=web tank/dom/web"
        );
    }

    #[tokio::test]
    async fn test_clone_and_destroy_arguments() {
        let (runner, zfs) = cli();
        runner.push_output("");
        runner.push_output(VOLUME_DUMP);
        zfs.clone_snapshot("tank/p/vol1@s1", "tank/p/copy", &Vec::new())
            .await
            .unwrap();

        zfs.destroy(
            "tank/p",
            DestroyOptions {
                recursive: true,
                dependents: true,
            },
        )
        .await
        .unwrap();

        let calls = runner.calls();
        assert_eq!(calls[0], "zfs clone tank/p/vol1@s1 tank/p/copy");
        assert_eq!(calls[2], "zfs destroy -r -R tank/p");
    }

    #[tokio::test]
    async fn test_missing_dataset_is_not_found() {
        let (runner, zfs) = cli();
        runner.push_failure(1, "cannot open 'tank/nope': dataset does not exist\n");
        let err = zfs.properties("tank/nope").await.unwrap_err();
        assert!(err.is_not_found());

        runner.push_failure(1, "cannot open 'tank/nope': dataset does not exist\n");
        assert!(!zfs.exists("tank/nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_other_failures_propagate_unchanged() {
        let (runner, zfs) = cli();
        runner.push_failure(
            1,
            "cannot destroy 'tank/p/vol1@s1': snapshot has dependent clones\n",
        );
        let err = zfs
            .destroy("tank/p/vol1@s1", DestroyOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::CommandFailed { .. }));
    }

    #[tokio::test]
    async fn test_set_property() {
        let (runner, zfs) = cli();
        zfs.set_property("tank/p/vol1", "volsize", "536870912")
            .await
            .unwrap();
        assert_eq!(runner.calls(), vec!["zfs set volsize=536870912 tank/p/vol1"]);
    }
}
