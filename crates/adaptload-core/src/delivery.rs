//! Fetch URLs at the decided fidelity.
//!
//! Images go through the image-optimizing endpoint with a width bucket and
//! the decision's quality. Videos carry the quality as a query parameter for
//! the origin to pick a rendition. Scripts and styles are fetched as declared.

use url::form_urlencoded;

use crate::resource::{ResourceDescriptor, ResourceKind};
use crate::strategy::LoadingDecision;

pub const IMAGE_ENDPOINT: &str = "/_next/image";

/// Width buckets the optimizer serves.
pub const WIDTH_BUCKETS: [u32; 8] = [640, 750, 828, 1080, 1200, 1920, 2048, 3840];

/// Width requested when a descriptor declares none.
pub const DEFAULT_WIDTH: u32 = 1080;

/// Smallest bucket that covers `declared`, or the largest bucket.
pub fn width_bucket(declared: Option<u32>) -> u32 {
    let Some(width) = declared else {
        return DEFAULT_WIDTH;
    };
    WIDTH_BUCKETS
        .iter()
        .copied()
        .find(|&bucket| bucket >= width)
        .unwrap_or(WIDTH_BUCKETS[WIDTH_BUCKETS.len() - 1])
}

pub fn delivery_url(descriptor: &ResourceDescriptor, decision: &LoadingDecision) -> String {
    let kind = descriptor.kind();
    if !kind.is_media() {
        return descriptor.url().to_string();
    }
    let quality = decision.target_quality.min(100).to_string();
    match kind {
        ResourceKind::Image => {
            let query = form_urlencoded::Serializer::new(String::new())
                .append_pair("url", descriptor.url())
                .append_pair("w", &width_bucket(descriptor.declared_width()).to_string())
                .append_pair("q", &quality)
                .finish();
            format!("{IMAGE_ENDPOINT}?{query}")
        }
        _ => {
            let pair = form_urlencoded::Serializer::new(String::new())
                .append_pair("q", &quality)
                .finish();
            let (base, fragment) = match descriptor.url().split_once('#') {
                Some((base, fragment)) => (base, Some(fragment)),
                None => (descriptor.url(), None),
            };
            let sep = if base.contains('?') { '&' } else { '?' };
            match fragment {
                Some(fragment) => format!("{base}{sep}{pair}#{fragment}"),
                None => format!("{base}{sep}{pair}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::ConnectionProfile;
    use crate::resource::PriorityTier;
    use crate::strategy::{resolve, ProximitySignal};

    fn decision(kind: ResourceKind) -> LoadingDecision {
        resolve(
            PriorityTier::High,
            kind,
            &ConnectionProfile::fast_default(),
            ProximitySignal::new(true, false),
        )
    }

    #[test]
    fn buckets() {
        assert_eq!(width_bucket(None), 1080);
        assert_eq!(width_bucket(Some(100)), 640);
        assert_eq!(width_bucket(Some(1080)), 1080);
        assert_eq!(width_bucket(Some(1081)), 1200);
        assert_eq!(width_bucket(Some(9000)), 3840);
    }

    #[test]
    fn image_goes_through_optimizer() {
        let d = ResourceDescriptor::new("/images/hero shot.png", ResourceKind::Image, PriorityTier::High)
            .with_dimensions(1200, 630);
        assert_eq!(
            delivery_url(&d, &decision(ResourceKind::Image)),
            "/_next/image?url=%2Fimages%2Fhero+shot.png&w=1200&q=90"
        );
    }

    #[test]
    fn video_gets_quality_param() {
        let d = ResourceDescriptor::new("/media/intro.mp4?v=2#t=5", ResourceKind::Video, PriorityTier::Medium);
        assert_eq!(
            delivery_url(&d, &decision(ResourceKind::Video)),
            "/media/intro.mp4?v=2&q=90#t=5"
        );
    }

    #[test]
    fn scripts_unchanged() {
        let d = ResourceDescriptor::new("/_next/static/app.js", ResourceKind::Script, PriorityTier::High);
        assert_eq!(delivery_url(&d, &decision(ResourceKind::Script)), "/_next/static/app.js");
    }

    #[test]
    fn styles_ignore_a_lowered_quality() {
        let d = ResourceDescriptor::new("/_next/static/app.css?v=3", ResourceKind::Style, PriorityTier::Low);
        let mut lowered = decision(ResourceKind::Style);
        lowered.target_quality = 40;
        assert_eq!(delivery_url(&d, &lowered), "/_next/static/app.css?v=3");
    }
}
