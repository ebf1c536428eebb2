//! The per-frame loop: analyze, identify, annotate, alert, log, display.

use image::RgbImage;
use log::{debug, error, info, warn};

use crate::analysis::{FaceAnalyzer, IdentityMatcher};
use crate::annotate::{Annotator, FaceLabel};
use crate::dedup::{FaceSignature, SeenSignatures};
use crate::device::{FrameDisplay, FrameSource};
use crate::error::AnalysisError;
use crate::face::{DetectedFace, IdentityMatch, Region};
use crate::notify::{NotificationSink, DEFAULT_CAPTION};
use crate::session_log::{LogEntry, SessionLog};
use crate::snapshot::SnapshotStore;

/// What one frame produced.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    pub faces: usize,
    pub alerts: usize,
}

/// Totals for one call to [`Monitor::run`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: usize,
    pub faces: usize,
    pub analysis_failures: usize,
    pub alerts: usize,
}

/// Owns every piece of state the loop touches. The signature set and the
/// log writer live exactly as long as the monitor.
pub struct Monitor<A, M, N> {
    analyzer: A,
    matcher: M,
    notifier: N,
    annotator: Annotator,
    log: SessionLog,
    snapshots: SnapshotStore,
    seen: SeenSignatures,
    caption: String,
}

impl<A, M, N> Monitor<A, M, N>
where
    A: FaceAnalyzer,
    M: IdentityMatcher,
    N: NotificationSink,
{
    pub fn new(
        analyzer: A,
        matcher: M,
        notifier: N,
        annotator: Annotator,
        log: SessionLog,
        snapshots: SnapshotStore,
    ) -> Self {
        Self {
            analyzer,
            matcher,
            notifier,
            annotator,
            log,
            snapshots,
            seen: SeenSignatures::new(),
            caption: DEFAULT_CAPTION.to_string(),
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = caption.into();
        self
    }

    pub fn seen(&self) -> &SeenSignatures {
        &self.seen
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Run until the source runs dry, the display fails, or the user quits.
    pub fn run<S, D>(&mut self, source: &mut S, display: &mut D) -> RunSummary
    where
        S: FrameSource,
        D: FrameDisplay,
    {
        let mut summary = RunSummary::default();

        loop {
            let mut frame = match source.next_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    info!("capture stopped: {}", e);
                    break;
                }
            };
            summary.frames += 1;

            match self.process_frame(&mut frame) {
                Ok(report) => {
                    summary.faces += report.faces;
                    summary.alerts += report.alerts;
                }
                Err(e) => {
                    error!("frame {}: {}", summary.frames, e);
                    summary.analysis_failures += 1;
                }
            }

            if let Err(e) = display.show(&frame) {
                error!("{}", e);
                break;
            }
            if display.quit_requested() {
                info!("quit requested");
                break;
            }
        }

        info!(
            "processed {} frame(s), {} face(s), {} alert(s), {} failed analysis",
            summary.frames, summary.faces, summary.alerts, summary.analysis_failures
        );
        summary
    }

    /// Analyze one frame and handle each face in detector order. The frame
    /// is annotated in place. On error no face was handled.
    pub fn process_frame(&mut self, frame: &mut RgbImage) -> Result<FrameReport, AnalysisError> {
        let faces = self.analyzer.analyze(frame)?;

        let mut report = FrameReport {
            faces: faces.len(),
            alerts: 0,
        };
        for face in &faces {
            if self.process_face(frame, face) {
                report.alerts += 1;
            }
        }
        Ok(report)
    }

    /// Returns true when this face raised an alert.
    fn process_face(&mut self, frame: &mut RgbImage, face: &DetectedFace) -> bool {
        let approx_age = face.approx_age();
        let gender = face.gender.label().to_string();
        let identity = self.identify(frame, face.region);
        debug!(
            "face at {:?}: {} ({}), {} {} age {}",
            face.region,
            identity.name,
            if identity.is_known { "known" } else { "unknown" },
            gender,
            face.dominant_emotion,
            approx_age
        );

        let label = FaceLabel {
            name: identity.name.clone(),
            emotion: face.dominant_emotion.clone(),
            gender: gender.clone(),
            age_range: face.age_range(),
        };
        self.annotator.annotate(frame, face.region, &label);

        let mut alerted = false;
        if !identity.is_known {
            let signature = FaceSignature::new(approx_age, gender.as_str(), face.dominant_emotion.as_str());
            if self.seen.first_sighting(signature) {
                alerted = self.alert(frame);
            }
        }

        let entry = LogEntry::now(&identity.name, approx_age, &gender, &face.dominant_emotion);
        if let Err(e) = self.log.append(&entry) {
            error!("cannot append to {}: {}", self.log.path().display(), e);
        }

        alerted
    }

    fn identify(&mut self, frame: &RgbImage, region: Region) -> IdentityMatch {
        let Some(r) = region.clamp_to(frame.width(), frame.height()) else {
            debug!("face region {:?} is outside the frame", region);
            return IdentityMatch::unknown();
        };
        let crop = image::imageops::crop_imm(frame, r.x, r.y, r.width, r.height).to_image();

        match self.matcher.find(&crop) {
            Ok(candidates) => IdentityMatch::from_candidates(&candidates),
            Err(e) => {
                debug!("{}", e);
                IdentityMatch::unknown()
            }
        }
    }

    /// Save the annotated frame and hand it to the notifier. True once the
    /// snapshot exists.
    fn alert(&mut self, frame: &RgbImage) -> bool {
        let path = match self.snapshots.save(frame) {
            Ok(path) => path,
            Err(e) => {
                error!("{}", e);
                return false;
            }
        };
        if let Err(e) = self.notifier.send_photo(&path, &self.caption) {
            warn!("alert for {} not delivered: {}", path.display(), e);
        }
        true
    }
}
