//! Stage identifiers and their data dependencies.
//!
//! The pipeline is a fixed four-node DAG. [`StageId::ALL`] lists the
//! nodes in execution order and [`StageId::inputs`] names the artifacts
//! each one reads, which makes the diamond on the grayscale raster
//! explicit: both [`StageId::Invert`] and [`StageId::DodgeBlend`] consume
//! it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A raster produced or consumed somewhere in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Artifact {
    /// The caller's source raster.
    Source,
    /// Output of [`StageId::Grayscale`].
    Grayscale,
    /// Output of [`StageId::Invert`].
    Inverted,
    /// Output of [`StageId::Blur`].
    Blurred,
    /// Output of [`StageId::DodgeBlend`], the finished sketch.
    Sketch,
}

/// One processing step of the sketch pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageId {
    /// RGB to luminance.
    Grayscale,
    /// `255 - v`.
    Invert,
    /// Separable Gaussian blur.
    Blur,
    /// Color dodge of grayscale by blurred.
    DodgeBlend,
}

impl StageId {
    /// All stages in execution order.
    pub const ALL: [Self; 4] = [Self::Grayscale, Self::Invert, Self::Blur, Self::DodgeBlend];

    /// Display label for the stage.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Grayscale => "Grayscale",
            Self::Invert => "Invert",
            Self::Blur => "Blur",
            Self::DodgeBlend => "Dodge Blend",
        }
    }

    /// Lowercase identifier, usable in file names.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Grayscale => "grayscale",
            Self::Invert => "invert",
            Self::Blur => "blur",
            Self::DodgeBlend => "dodge",
        }
    }

    /// Artifacts this stage reads, in operand order.
    ///
    /// For [`StageId::DodgeBlend`] the first entry is the base and the
    /// second the blend layer.
    #[must_use]
    pub const fn inputs(self) -> &'static [Artifact] {
        match self {
            Self::Grayscale => &[Artifact::Source],
            Self::Invert => &[Artifact::Grayscale],
            Self::Blur => &[Artifact::Inverted],
            Self::DodgeBlend => &[Artifact::Grayscale, Artifact::Blurred],
        }
    }

    /// The artifact this stage produces.
    #[must_use]
    pub const fn output(self) -> Artifact {
        match self {
            Self::Grayscale => Artifact::Grayscale,
            Self::Invert => Artifact::Inverted,
            Self::Blur => Artifact::Blurred,
            Self::DodgeBlend => Artifact::Sketch,
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_input_is_produced_before_use() {
        let mut available = vec![Artifact::Source];
        for stage in StageId::ALL {
            for input in stage.inputs() {
                assert!(
                    available.contains(input),
                    "{stage} reads {input:?} before it exists",
                );
            }
            available.push(stage.output());
        }
        assert_eq!(available.last(), Some(&Artifact::Sketch));
    }

    #[test]
    fn grayscale_feeds_two_stages() {
        let consumers: Vec<StageId> = StageId::ALL
            .into_iter()
            .filter(|s| s.inputs().contains(&Artifact::Grayscale))
            .collect();
        assert_eq!(consumers, vec![StageId::Invert, StageId::DodgeBlend]);
    }

    #[test]
    fn dodge_operands_are_base_then_blend() {
        assert_eq!(
            StageId::DodgeBlend.inputs(),
            &[Artifact::Grayscale, Artifact::Blurred],
        );
    }

    #[test]
    fn slugs_are_unique() {
        let mut slugs: Vec<&str> = StageId::ALL.iter().map(|s| s.slug()).collect();
        slugs.sort_unstable();
        slugs.dedup();
        assert_eq!(slugs.len(), StageId::ALL.len());
    }
}
