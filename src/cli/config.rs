//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::{Cli, CliBlend, CliPlacement, CliPolicy};
use crate::{
    config::{
        BlendMode, CompositeConfig, InferenceConfig, ModelsConfig, PlacementMode, StrategyPolicy,
    },
    utils::ExecutionProviderManager,
};
use anyhow::{Context, Result};

/// Converts parsed arguments into the library configuration
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Pipeline configuration from the global flags
    pub(crate) fn from_cli(cli: &Cli) -> Result<CompositeConfig> {
        let policy = match cli.policy {
            CliPolicy::Auto => StrategyPolicy::Auto,
            CliPolicy::Neural => StrategyPolicy::NeuralOnly,
            CliPolicy::Classical => StrategyPolicy::ClassicalOnly,
        };
        let placement = match cli.placement {
            CliPlacement::Fixed => PlacementMode::Fixed,
            CliPlacement::Heatmap => PlacementMode::Heatmap,
        };
        let blend = match cli.blend {
            CliBlend::Alpha => BlendMode::Alpha,
            CliBlend::Seamless => BlendMode::Seamless,
        };

        CompositeConfig::builder()
            .segmentation_policy(policy)
            .depth_policy(policy)
            .placement_mode(placement)
            .blend_mode(blend)
            .jpeg_quality(cli.jpeg_quality)
            .build()
            .context("Invalid configuration")
    }

    /// Model files and runtime selection from the global flags
    pub(crate) fn models_from_cli(cli: &Cli) -> Result<ModelsConfig> {
        let (backend_type, execution_provider) =
            ExecutionProviderManager::parse_provider_string(&cli.execution_provider)
                .context("Invalid execution provider format")?;

        Ok(ModelsConfig {
            segmentation_model: cli.segmentation_model.clone(),
            depth_model: cli.depth_model.clone(),
            backend_type,
            inference: InferenceConfig {
                execution_provider,
                // The same count serves intra- and inter-op parallelism
                intra_threads: cli.threads,
                inter_threads: cli.threads,
            },
            ..ModelsConfig::default()
        })
    }
}
