use crate::detection::domain::face_features::FaceFeatures;
use crate::overlay::domain::overlay_asset::OverlayAsset;
use crate::shared::frame::Frame;

/// Domain interface for drawing an overlay onto each detected face.
///
/// Consumes the frame and returns the composited one. With no overlay or no
/// faces the frame comes back unchanged. Faces are drawn in the given order,
/// later ones on top.
pub trait OverlayCompositor: Send {
    fn composite(
        &self,
        frame: Frame,
        faces: &[FaceFeatures],
        overlay: Option<&OverlayAsset>,
    ) -> Result<Frame, Box<dyn std::error::Error>>;
}
