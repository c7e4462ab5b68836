use super::Orchestrator;
use crate::error::{Result, RuntimeError};
use crate::zfs::DestroyOptions;
use lunar_core::{
    leaf_name, validate_component, validate_size, DatasetKind, LunarError, Project, ProjectPath,
    ProjectRequest,
};
use tracing::info;

impl Orchestrator {
    /// Projects directly under `pool/domain`
    pub async fn list_projects(&self, pool: &str, domain: &str) -> Result<Vec<Project>> {
        let base = format!("{}/{}", pool, domain);
        let datasets = self
            .datasets
            .list(DatasetKind::Filesystem, &base, true, Some(1))
            .await?;

        let mut projects = Vec::new();
        for dataset in datasets.into_iter().filter(|d| d.name != base) {
            let path = ProjectPath::new(pool, domain, leaf_name(&dataset.name));
            projects.push(self.get_project(&path).await?);
        }
        Ok(projects)
    }

    pub async fn get_project(&self, path: &ProjectPath) -> Result<Project> {
        let name = path.dataset();
        let properties = self.datasets.properties(&name).await?;
        let properties = properties
            .as_filesystem()
            .cloned()
            .ok_or_else(|| RuntimeError::not_found("Project", &name))?;

        Ok(Project {
            name: path.project.clone(),
            dataset: name,
            properties,
        })
    }

    pub async fn project_exists(&self, path: &ProjectPath) -> Result<bool> {
        self.datasets.exists(&path.dataset()).await
    }

    /// Create a project filesystem; a non-zero quota is mandatory
    pub async fn create_project(
        &self,
        path: &ProjectPath,
        request: &ProjectRequest,
    ) -> Result<Project> {
        validate_component("Project", &path.project)?;
        let quota = request.quota.map(|q| q.bytes()).ok_or_else(|| {
            LunarError::validation_failed(
                "Project",
                "quota is required",
                "Every project is created with a quota, e.g. \"quota\": \"10Gi\"",
            )
        })?;
        validate_size("Project", quota)?;

        let properties = request
            .optional_properties()
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        self.datasets
            .create_filesystem(&path.dataset(), quota, &properties)
            .await?;

        info!("Project created: {}", path);
        self.get_project(path).await
    }

    /// Apply only the supplied properties
    pub async fn modify_project(
        &self,
        path: &ProjectPath,
        request: &ProjectRequest,
    ) -> Result<Project> {
        let name = path.dataset();
        // existence check before any property is touched
        self.get_project(path).await?;

        if let Some(quota) = request.quota {
            validate_size("Project", quota.bytes())?;
            self.datasets
                .set_property(&name, "quota", &quota.to_string())
                .await?;
        }
        for (property, value) in request.optional_properties() {
            self.datasets.set_property(&name, property, &value).await?;
        }

        info!("Project modified: {}", path);
        self.get_project(path).await
    }

    /// Destroy a project; `force` also destroys its volumes, snapshots and dependent clones
    pub async fn destroy_project(&self, path: &ProjectPath, force: bool) -> Result<()> {
        self.get_project(path).await?;
        let options = DestroyOptions {
            recursive: force,
            dependents: force,
        };
        self.datasets.destroy(&path.dataset(), options).await?;
        info!("Project destroyed: {} (force: {})", path, force);
        Ok(())
    }
}
