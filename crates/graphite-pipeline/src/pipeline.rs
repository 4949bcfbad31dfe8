//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate raster before continuing.
//!
//! Unlike [`crate::process`], which runs the whole chain and keeps only
//! the sketch, [`Pipeline`] lets the caller drive execution one step at a
//! time:
//!
//! ```rust
//! # use graphite_pipeline::{Pipeline, PipelineConfig, PipelineError, Raster};
//! # fn run(photo: Raster) -> Result<(), PipelineError> {
//! let staged = Pipeline::new(photo, PipelineConfig::default())?
//!     .grayscale()
//!     .invert()
//!     .blur()
//!     .dodge()
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! The config is validated and the blur kernel built in
//! [`Pipeline::new`], so every later transition is infallible. Each stage
//! method consumes `self` and returns the next state, carrying all
//! previously computed rasters; skipping or reordering stages is a
//! compile error. A caller that wants to stop early simply drops the
//! current state.
//!
//! # Memory
//!
//! Every state retains the full raster stack. For a 1000×1000 source this
//! is about 3 MB per raster, 15 MB at [`Sketched`]. Callers that only need
//! the final image should prefer [`crate::process`], which drops the
//! inversion and blur as soon as they have been consumed.

use tracing::debug;

use crate::blur::GaussianKernel;
use crate::diagnostics::{self, StageMetrics};
use crate::stage::StageId;
use crate::types::{Dimensions, PipelineConfig, PipelineError, Raster, StagedResult};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// Call [`grayscale`](Self::grayscale) to advance.
#[must_use = "pipeline stages are consumed by advancing (call .grayscale() to continue)"]
pub struct Pending {
    config: PipelineConfig,
    kernel: GaussianKernel,
    source: Raster,
}

impl Pending {
    /// The caller's source raster.
    #[must_use]
    pub const fn source(&self) -> &Raster {
        &self.source
    }

    /// The validated configuration.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Convert to luminance and advance to [`Grayscaled`].
    pub fn grayscale(self) -> Grayscaled {
        let grayscale = crate::grayscale::to_grayscale(&self.source);
        debug!(dimensions = %grayscale.dimensions(), "grayscale complete");
        Grayscaled {
            config: self.config,
            kernel: self.kernel,
            original: self.source,
            grayscale,
        }
    }
}

// ───────────────────────── Stage 1: Grayscaled ───────────────────────

/// Pipeline state after luminance conversion.
///
/// The grayscale raster is kept for the final dodge blend. Call
/// [`invert`](Self::invert) to advance.
#[must_use = "pipeline stages are consumed by advancing (call .invert() to continue)"]
pub struct Grayscaled {
    config: PipelineConfig,
    kernel: GaussianKernel,
    original: Raster,
    grayscale: Raster,
}

impl Grayscaled {
    /// The original source raster.
    #[must_use]
    pub const fn original(&self) -> &Raster {
        &self.original
    }

    /// The luminance raster.
    #[must_use]
    pub const fn grayscale(&self) -> &Raster {
        &self.grayscale
    }

    /// Invert the grayscale raster and advance to [`Inverted`].
    pub fn invert(self) -> Inverted {
        let inverted = crate::invert::invert(&self.grayscale);
        debug!(dimensions = %inverted.dimensions(), "invert complete");
        Inverted {
            config: self.config,
            kernel: self.kernel,
            original: self.original,
            grayscale: self.grayscale,
            inverted,
        }
    }
}

// ───────────────────────── Stage 2: Inverted ─────────────────────────

/// Pipeline state after tonal inversion.
///
/// Call [`blur`](Self::blur) to advance.
#[must_use = "pipeline stages are consumed by advancing (call .blur() to continue)"]
pub struct Inverted {
    config: PipelineConfig,
    kernel: GaussianKernel,
    original: Raster,
    grayscale: Raster,
    inverted: Raster,
}

impl Inverted {
    /// The inverted grayscale raster.
    #[must_use]
    pub const fn inverted(&self) -> &Raster {
        &self.inverted
    }

    /// Blur the inverted raster and advance to [`Blurred`].
    pub fn blur(self) -> Blurred {
        let blurred = crate::blur::blur_with_kernel(&self.inverted, &self.kernel);
        debug!(
            radius = self.kernel.radius(),
            sigma = self.kernel.sigma(),
            "blur complete"
        );
        Blurred {
            config: self.config,
            kernel: self.kernel,
            original: self.original,
            grayscale: self.grayscale,
            inverted: self.inverted,
            blurred,
        }
    }
}

// ───────────────────────── Stage 3: Blurred ──────────────────────────

/// Pipeline state after Gaussian blur.
///
/// Call [`dodge`](Self::dodge) to advance.
#[must_use = "pipeline stages are consumed by advancing (call .dodge() to continue)"]
pub struct Blurred {
    config: PipelineConfig,
    kernel: GaussianKernel,
    original: Raster,
    grayscale: Raster,
    inverted: Raster,
    blurred: Raster,
}

impl Blurred {
    /// The blurred inversion.
    #[must_use]
    pub const fn blurred(&self) -> &Raster {
        &self.blurred
    }

    /// The kernel the blur used.
    #[must_use]
    pub const fn kernel(&self) -> &GaussianKernel {
        &self.kernel
    }

    /// Dodge-blend grayscale (base) with blurred (blend) and advance to
    /// [`Sketched`].
    ///
    /// Every stage preserves dimensions, so the two operands always
    /// match here.
    pub fn dodge(self) -> Sketched {
        let sketch = crate::dodge::blend_same_size(&self.grayscale, &self.blurred);
        debug!(dimensions = %sketch.dimensions(), "dodge blend complete");
        Sketched {
            config: self.config,
            original: self.original,
            grayscale: self.grayscale,
            inverted: self.inverted,
            blurred: self.blurred,
            sketch,
        }
    }
}

// ───────────────────────── Stage 4: Sketched ─────────────────────────

/// Final pipeline state: the sketch is ready.
pub struct Sketched {
    config: PipelineConfig,
    original: Raster,
    grayscale: Raster,
    inverted: Raster,
    blurred: Raster,
    sketch: Raster,
}

impl Sketched {
    /// The finished sketch.
    #[must_use]
    pub const fn sketch(&self) -> &Raster {
        &self.sketch
    }

    /// The configuration the run used.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Image dimensions, shared by every raster in the run.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.sketch.dimensions()
    }

    /// Consume the pipeline and return only the sketch.
    #[must_use]
    pub fn into_sketch(self) -> Raster {
        self.sketch
    }

    /// Consume the pipeline and return the full [`StagedResult`].
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        let dimensions = self.dimensions();
        StagedResult {
            original: self.original,
            grayscale: self.grayscale,
            inverted: self.inverted,
            blurred: self.blurred,
            sketch: self.sketch,
            dimensions,
        }
    }
}

// ──────────────────── PipelineStage trait + Stage enum ────────────────

/// Total number of states in the pipeline, `Pending` included.
pub const STAGE_COUNT: usize = 5;

/// The output produced by a single pipeline state.
///
/// Each variant borrows the raster that the corresponding stage computed.
#[must_use]
pub enum StageOutput<'a> {
    /// Source raster, nothing processed yet.
    Source {
        /// The caller's raster.
        source: &'a Raster,
    },
    /// Luminance raster.
    Grayscale {
        /// The grayscale raster.
        grayscale: &'a Raster,
    },
    /// Inverted grayscale.
    Inverted {
        /// The inverted raster.
        inverted: &'a Raster,
    },
    /// Blurred inversion.
    Blurred {
        /// The blurred raster.
        blurred: &'a Raster,
    },
    /// Final sketch.
    Sketch {
        /// The sketch raster.
        sketch: &'a Raster,
    },
}

impl<'a> StageOutput<'a> {
    /// The raster this output carries.
    #[must_use]
    pub const fn raster(&self) -> &'a Raster {
        match *self {
            Self::Source { source: r }
            | Self::Grayscale { grayscale: r }
            | Self::Inverted { inverted: r }
            | Self::Blurred { blurred: r }
            | Self::Sketch { sketch: r } => r,
        }
    }
}

/// Trait implemented by every pipeline state, enabling uniform iteration.
///
/// Both the typed API (individual state structs) and the dynamic API
/// ([`Stage`] enum) are available. This trait bridges the two.
///
/// # Loop pattern
///
/// ```rust
/// # use graphite_pipeline::{Pipeline, PipelineConfig, PipelineError, Raster};
/// # use graphite_pipeline::pipeline::{Advance, Stage};
/// # fn run(photo: Raster) -> Result<(), PipelineError> {
/// let mut stage: Stage = Pipeline::new(photo, PipelineConfig::default())?.into();
/// loop {
///     match stage.advance() {
///         Advance::Next(next) => stage = next,
///         Advance::Complete(done) => { stage = done; break; }
///     }
/// }
/// let result = stage.complete();
/// # Ok(())
/// # }
/// ```
pub trait PipelineStage: Sized {
    /// Short name of this state (e.g. `"source"`, `"blur"`).
    const NAME: &str;

    /// Zero-based index of this state (`0` for Pending through `4` for
    /// Sketched).
    const INDEX: usize;

    /// The stage whose work produced this state, `None` for [`Pending`].
    const STAGE: Option<StageId>;

    /// The output this state holds.
    fn output(&self) -> StageOutput<'_>;

    /// Metrics describing the work done to reach this state.
    ///
    /// Returns `None` for [`Pending`], which has not processed anything.
    fn metrics(&self) -> Option<StageMetrics>;

    /// Advance to the next state, or `None` if already at the final one.
    fn next(self) -> Option<Stage>;

    /// Run all remaining stages and return the [`StagedResult`].
    fn complete(self) -> StagedResult;
}

impl PipelineStage for Pending {
    const NAME: &str = "source";
    const INDEX: usize = 0;
    const STAGE: Option<StageId> = None;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Source {
            source: &self.source,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        None
    }

    fn next(self) -> Option<Stage> {
        Some(Stage::Grayscaled(self.grayscale()))
    }

    fn complete(self) -> StagedResult {
        self.grayscale().complete()
    }
}

impl PipelineStage for Grayscaled {
    const NAME: &str = "grayscale";
    const INDEX: usize = 1;
    const STAGE: Option<StageId> = Some(StageId::Grayscale);

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Grayscale {
            grayscale: &self.grayscale,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Grayscale {
            width: self.grayscale.width(),
            height: self.grayscale.height(),
            mean_luminance: diagnostics::mean_level(&self.grayscale),
        })
    }

    fn next(self) -> Option<Stage> {
        Some(Stage::Inverted(self.invert()))
    }

    fn complete(self) -> StagedResult {
        self.invert().complete()
    }
}

impl PipelineStage for Inverted {
    const NAME: &str = "invert";
    const INDEX: usize = 2;
    const STAGE: Option<StageId> = Some(StageId::Invert);

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Inverted {
            inverted: &self.inverted,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Invert {
            mean_level: diagnostics::mean_level(&self.inverted),
        })
    }

    fn next(self) -> Option<Stage> {
        Some(Stage::Blurred(self.blur()))
    }

    fn complete(self) -> StagedResult {
        self.blur().complete()
    }
}

impl PipelineStage for Blurred {
    const NAME: &str = "blur";
    const INDEX: usize = 3;
    const STAGE: Option<StageId> = Some(StageId::Blur);

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Blurred {
            blurred: &self.blurred,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Blur {
            radius: self.kernel.radius(),
            sigma: self.kernel.sigma(),
            kernel_len: self.kernel.weights().len(),
        })
    }

    fn next(self) -> Option<Stage> {
        Some(Stage::Sketched(self.dodge()))
    }

    fn complete(self) -> StagedResult {
        self.dodge().complete()
    }
}

impl PipelineStage for Sketched {
    const NAME: &str = "dodge";
    const INDEX: usize = 4;
    const STAGE: Option<StageId> = Some(StageId::DodgeBlend);

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Sketch {
            sketch: &self.sketch,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        let saturated_channels = diagnostics::count_saturated_channels(&self.sketch);
        Some(StageMetrics::DodgeBlend {
            saturated_channels,
            total_channels: self.sketch.dimensions().pixel_count() * 3,
        })
    }

    fn next(self) -> Option<Stage> {
        None
    }

    fn complete(self) -> StagedResult {
        self.into_result()
    }
}

/// Enum wrapping all pipeline states for uniform, loopable access.
///
/// Use [`From`] conversions to enter the dynamic API from any typed
/// state, then call [`advance`](Self::advance) in a loop.
#[must_use]
pub enum Stage {
    /// See [`Pending`].
    Pending(Pending),
    /// See [`Grayscaled`].
    Grayscaled(Grayscaled),
    /// See [`Inverted`].
    Inverted(Inverted),
    /// See [`Blurred`].
    Blurred(Blurred),
    /// See [`Sketched`].
    Sketched(Sketched),
}

/// Compile-time guard: if a [`Stage`] variant is added, this match becomes
/// non-exhaustive and the build fails, a reminder to bump [`STAGE_COUNT`].
#[allow(dead_code, clippy::match_same_arms)]
const fn _stage_count_guard(s: &Stage) {
    match s {
        Stage::Pending(_)
        | Stage::Grayscaled(_)
        | Stage::Inverted(_)
        | Stage::Blurred(_)
        | Stage::Sketched(_) => {}
    }
}

/// Result of [`Stage::advance`]: either the next state or the final
/// state returned unchanged.
#[must_use]
pub enum Advance {
    /// The pipeline advanced to this next state.
    Next(Stage),
    /// The pipeline was already at the final state.
    Complete(Stage),
}

/// Delegate a method call to whichever `Stage` variant is active.
macro_rules! delegate {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            Self::Pending(s) => s.$method($($arg),*),
            Self::Grayscaled(s) => s.$method($($arg),*),
            Self::Inverted(s) => s.$method($($arg),*),
            Self::Blurred(s) => s.$method($($arg),*),
            Self::Sketched(s) => s.$method($($arg),*),
        }
    };
}

impl Stage {
    /// Short name of the current state.
    #[must_use]
    pub fn name(&self) -> &'static str {
        delegate!(self, name)
    }

    /// Zero-based index of the current state.
    #[must_use]
    pub fn index(&self) -> usize {
        delegate!(self, index)
    }

    /// The stage whose work produced the current state.
    #[must_use]
    pub fn stage_id(&self) -> Option<StageId> {
        delegate!(self, stage_id)
    }

    /// The output the current state holds.
    pub fn output(&self) -> StageOutput<'_> {
        delegate!(self, output)
    }

    /// Stage-specific metrics for diagnostics.
    #[must_use]
    pub fn metrics(&self) -> Option<StageMetrics> {
        delegate!(self, metrics)
    }

    /// Whether the pipeline is at the final state.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Sketched(_))
    }

    /// Advance to the next state. Returns `None` if already complete (the
    /// final state is consumed).
    #[must_use]
    pub fn next(self) -> Option<Self> {
        delegate!(self, next)
    }

    /// Advance to the next state, returning `self` unchanged if already
    /// complete.
    ///
    /// Unlike [`next`](Self::next), the final state survives so
    /// [`complete`](Self::complete) can still be called on it.
    pub fn advance(self) -> Advance {
        match self {
            Self::Pending(s) => Advance::Next(Self::Grayscaled(s.grayscale())),
            Self::Grayscaled(s) => Advance::Next(Self::Inverted(s.invert())),
            Self::Inverted(s) => Advance::Next(Self::Blurred(s.blur())),
            Self::Blurred(s) => Advance::Next(Self::Sketched(s.dodge())),
            Self::Sketched(s) => Advance::Complete(Self::Sketched(s)),
        }
    }

    /// Run all remaining stages to completion.
    #[must_use]
    pub fn complete(self) -> StagedResult {
        delegate!(self, complete)
    }
}

// Private helper trait so the macro can call `.name()` and friends on
// `&self`; associated constants aren't reachable through `self`.
trait StageMetadata {
    fn name(&self) -> &'static str;
    fn index(&self) -> usize;
    fn stage_id(&self) -> Option<StageId>;
}

impl<T: PipelineStage> StageMetadata for T {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn index(&self) -> usize {
        T::INDEX
    }

    fn stage_id(&self) -> Option<StageId> {
        T::STAGE
    }
}

impl From<Pending> for Stage {
    fn from(s: Pending) -> Self {
        Self::Pending(s)
    }
}

impl From<Grayscaled> for Stage {
    fn from(s: Grayscaled) -> Self {
        Self::Grayscaled(s)
    }
}

impl From<Inverted> for Stage {
    fn from(s: Inverted) -> Self {
        Self::Inverted(s)
    }
}

impl From<Blurred> for Stage {
    fn from(s: Blurred) -> Self {
        Self::Blurred(s)
    }
}

impl From<Sketched> for Stage {
    fn from(s: Sketched) -> Self {
        Self::Sketched(s)
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental sketch pipeline.
///
/// Created via [`Pipeline::new`], which validates the config and stores
/// the source raster without touching its pixels.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline from a source raster and config.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `config` fails
    /// [`PipelineConfig::validate`]. Nothing is processed in that case.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(source: Raster, config: PipelineConfig) -> Result<Pending, PipelineError> {
        let kernel = config.blur_kernel()?;
        Ok(Pending {
            config,
            kernel,
            source,
        })
    }
}
