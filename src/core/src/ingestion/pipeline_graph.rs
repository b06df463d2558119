//! Builds the analysis pipelines of a contract.
//!
//! Each declared pipeline is first planned in memory as a [`PipelineGraph`]:
//! distinct container nodes plus ordered stages pointing at them. Every node
//! of the analysis section is resolved to a model before any stage is wired,
//! so `from`/`to` references can name models declared anywhere in the
//! section. The wired stages are then flattened into one `analysis` row per
//! stage and per sensor pipeline.

use std::collections::{HashMap, HashSet};

use log::{debug, info};
use sea_orm::{ConnectionTrait, EntityTrait, Set, TransactionTrait};

use crate::contract::types::{Analysis, ContainerSpec, ModelRef, PipelineDeclaration, StageDeclaration};
use crate::error_handling::types::{IngestError, ValidationError};
use crate::ingestion::entities;
use crate::storage::db_entities::analysis;

/// Position of a stage in the chain, derived from its references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageRole {
    Standalone,
    Producer,
    Consumer,
    Link,
}

impl StageRole {
    pub fn of(stage: &StageDeclaration) -> Self {
        match (&stage.from, &stage.to) {
            (None, None) => StageRole::Standalone,
            (None, Some(_)) => StageRole::Producer,
            (Some(_), None) => StageRole::Consumer,
            (Some(_), Some(_)) => StageRole::Link,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlannedStage<'a> {
    /// Index into [`PipelineGraph::nodes`].
    pub node: usize,
    pub role: StageRole,
    pub persist: bool,
    pub from: Option<&'a ModelRef>,
    pub to: Option<&'a ModelRef>,
}

/// One wired stage, ready to be written for every sensor pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub execute: i32,
    pub prev_model: Option<i32>,
    pub next_model: Option<i32>,
    pub persist: bool,
}

#[derive(Debug)]
pub struct PipelineGraph<'a> {
    nodes: Vec<&'a ContainerSpec>,
    stages: Vec<PlannedStage<'a>>,
}

impl<'a> PipelineGraph<'a> {
    pub fn plan(declaration: &'a PipelineDeclaration) -> Self {
        let mut nodes: Vec<&'a ContainerSpec> = Vec::new();
        let mut stages = Vec::with_capacity(declaration.stages.len());
        for stage in &declaration.stages {
            let node = match nodes.iter().position(|n| **n == stage.container) {
                Some(existing) => existing,
                None => {
                    nodes.push(&stage.container);
                    nodes.len() - 1
                }
            };
            stages.push(PlannedStage {
                node,
                role: StageRole::of(stage),
                persist: stage.persist,
                from: stage.from.as_ref(),
                to: stage.to.as_ref(),
            });
        }
        Self { nodes, stages }
    }

    /// Distinct containers in order of first appearance.
    pub fn nodes(&self) -> &[&'a ContainerSpec] {
        &self.nodes
    }

    pub fn stages(&self) -> &[PlannedStage<'a>] {
        &self.stages
    }

    /// Wires every stage. `models[i]` is the model resolved for `nodes()[i]`.
    pub fn wire(&self, models: &[i32], index: &ModelIndex) -> Result<Vec<Edge>, IngestError> {
        self.stages
            .iter()
            .map(|stage| {
                let prev_model = stage.from.map(|r| index.lookup(r)).transpose()?;
                let next_model = stage.to.map(|r| index.lookup(r)).transpose()?;
                Ok(Edge {
                    execute: models[stage.node],
                    prev_model,
                    next_model,
                    persist: stage.persist,
                })
            })
            .collect()
    }
}

/// Models of one analysis section by image url and tag.
#[derive(Debug, Default)]
pub struct ModelIndex {
    by_ref: HashMap<ModelRef, i32>,
}

impl ModelIndex {
    /// Keeps the first model recorded for a reference.
    pub fn record(&mut self, reference: ModelRef, model: i32) {
        self.by_ref.entry(reference).or_insert(model);
    }

    pub fn lookup(&self, reference: &ModelRef) -> Result<i32, IngestError> {
        self.by_ref
            .get(reference)
            .copied()
            .ok_or_else(|| IngestError::DanglingModelReference {
                url: reference.url.clone(),
                tag: reference.tag.clone(),
            })
    }
}

/// Builds the pipelines the current system runs for this contract and
/// returns the number of analysis rows written.
///
/// `sensors` maps declared sensor names to their contract-machine-sensor id.
pub async fn build<C>(
    conn: &C,
    analysis_section: &Analysis,
    local_system: &str,
    system_id: i32,
    sensors: &HashMap<String, i32>,
) -> Result<usize, IngestError>
where
    C: ConnectionTrait + TransactionTrait,
{
    if !analysis_section.enable {
        debug!("analysis disabled, no pipelines to build");
        return Ok(0);
    }

    let declarations: Vec<&PipelineDeclaration> = analysis_section
        .systems
        .iter()
        .filter(|system| system.enable && system.name == local_system)
        .flat_map(|system| system.pipelines.iter())
        .collect();

    let mut index = ModelIndex::default();
    let mut planned = Vec::with_capacity(declarations.len());
    for declaration in declarations {
        let graph = PipelineGraph::plan(declaration);
        let mut models = Vec::with_capacity(graph.nodes().len());
        for node in graph.nodes() {
            let model = entities::model(conn, node).await?.id;
            index.record(node.model_ref(), model);
            models.push(model);
        }
        planned.push((declaration, graph, models));
    }

    let mut rows = 0;
    for (declaration, graph, models) in &planned {
        let edges = graph.wire(models, &index)?;
        let pipelines = sensor_pipelines(conn, declaration, local_system, system_id, sensors).await?;
        for pipeline in &pipelines {
            for edge in &edges {
                analysis::Entity::insert(analysis::ActiveModel {
                    pipeline: Set(*pipeline),
                    prev_model: Set(edge.prev_model),
                    next_model: Set(edge.next_model),
                    persist: Set(edge.persist),
                    execute: Set(edge.execute),
                    ..Default::default()
                })
                .exec_without_returning(conn)
                .await?;
                rows += 1;
            }
        }
    }
    if rows > 0 {
        info!("built {} pipeline(s) with {} analysis row(s)", planned.len(), rows);
    }
    Ok(rows)
}

/// One pipeline row per distinct sensor of the declaration.
async fn sensor_pipelines<C>(
    conn: &C,
    declaration: &PipelineDeclaration,
    local_system: &str,
    system_id: i32,
    sensors: &HashMap<String, i32>,
) -> Result<Vec<i32>, IngestError>
where
    C: ConnectionTrait + TransactionTrait,
{
    let delay = declaration.trigger.delay();
    let mut seen = HashSet::new();
    let mut pipelines = Vec::new();
    for name in &declaration.sensors {
        let contract_machine_sensor =
            *sensors
                .get(name)
                .ok_or_else(|| ValidationError::UnknownSensor {
                    system: local_system.to_string(),
                    sensor: name.clone(),
                })?;
        let pipeline =
            entities::pipeline(conn, contract_machine_sensor, system_id, delay.clone()).await?.id;
        if seen.insert(pipeline) {
            pipelines.push(pipeline);
        }
    }
    Ok(pipelines)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(url: &str) -> ContainerSpec {
        ContainerSpec {
            url: url.into(),
            tag: "1".into(),
            arguments: vec![],
            environment: vec![],
        }
    }

    fn reference(url: &str) -> ModelRef {
        ModelRef {
            url: url.into(),
            tag: "1".into(),
        }
    }

    fn stage(url: &str, from: Option<&str>, to: Option<&str>) -> StageDeclaration {
        StageDeclaration {
            container: image(url),
            persist: false,
            from: from.map(reference),
            to: to.map(reference),
        }
    }

    fn chain() -> PipelineDeclaration {
        PipelineDeclaration {
            stages: vec![
                stage("a", None, Some("b")),
                stage("b", Some("a"), Some("c")),
                stage("c", Some("b"), None),
            ],
            sensors: vec!["s1".into()],
            ..Default::default()
        }
    }

    #[test]
    fn roles_follow_references() {
        let declaration = chain();
        let graph = PipelineGraph::plan(&declaration);
        let roles: Vec<StageRole> = graph.stages().iter().map(|s| s.role).collect();
        assert_eq!(
            roles,
            vec![StageRole::Producer, StageRole::Link, StageRole::Consumer]
        );
        assert_eq!(StageRole::of(&stage("x", None, None)), StageRole::Standalone);
    }

    #[test]
    fn repeated_container_is_one_node() {
        let declaration = PipelineDeclaration {
            stages: vec![stage("a", None, None), stage("b", None, None), stage("a", None, None)],
            ..Default::default()
        };
        let graph = PipelineGraph::plan(&declaration);
        assert_eq!(graph.nodes().len(), 2);
        let nodes: Vec<usize> = graph.stages().iter().map(|s| s.node).collect();
        assert_eq!(nodes, vec![0, 1, 0]);
    }

    #[test]
    fn arguments_split_nodes() {
        let mut other = stage("a", None, None);
        other.container.arguments = vec!["--fast".into()];
        let declaration = PipelineDeclaration {
            stages: vec![stage("a", None, None), other],
            ..Default::default()
        };
        assert_eq!(PipelineGraph::plan(&declaration).nodes().len(), 2);
    }

    #[test]
    fn chain_wires_prev_and_next() {
        let declaration = chain();
        let graph = PipelineGraph::plan(&declaration);
        let mut index = ModelIndex::default();
        let models = vec![10, 20, 30];
        for (node, model) in graph.nodes().iter().zip(&models) {
            index.record(node.model_ref(), *model);
        }
        let edges = graph.wire(&models, &index).unwrap();
        assert_eq!(
            edges,
            vec![
                Edge { execute: 10, prev_model: None, next_model: Some(20), persist: false },
                Edge { execute: 20, prev_model: Some(10), next_model: Some(30), persist: false },
                Edge { execute: 30, prev_model: Some(20), next_model: None, persist: false },
            ]
        );
    }

    #[test]
    fn unknown_reference_is_dangling() {
        let declaration = PipelineDeclaration {
            stages: vec![stage("a", None, Some("ghost"))],
            ..Default::default()
        };
        let graph = PipelineGraph::plan(&declaration);
        let mut index = ModelIndex::default();
        index.record(reference("a"), 1);
        match graph.wire(&[1], &index) {
            Err(IngestError::DanglingModelReference { url, tag }) => {
                assert_eq!(url, "ghost");
                assert_eq!(tag, "1");
            }
            other => panic!("expected a dangling reference, got {:?}", other),
        }
    }

    #[test]
    fn first_recorded_model_wins() {
        let mut index = ModelIndex::default();
        index.record(reference("a"), 1);
        index.record(reference("a"), 2);
        assert_eq!(index.lookup(&reference("a")).unwrap(), 1);
    }
}
