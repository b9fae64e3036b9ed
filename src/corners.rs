//! Interactive corner point editing
//!
//! The UI turns clicks and drags into explicit commands on a [`CornerSet`].
//! Every command returns a [`CornerEvent`] that the owner forwards to any
//! [`CornerObserver`] (the grid generator being the main one).

use serde::Serialize;

use crate::error::{RectifyError, Result};
use crate::geometry::{ImagePoint, ViewportPoint};
use crate::view::ViewTransform;

/// Number of points that define a quad
pub const QUAD_CORNERS: usize = 4;

/// Change notification produced by a corner edit
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CornerEvent {
    Added { index: usize, point: ImagePoint },
    Moved { index: usize, point: ImagePoint },
    Removed { index: usize, point: ImagePoint },
    Replaced { count: usize },
    Cleared,
}

/// Receives every corner edit together with the resulting corner list
pub trait CornerObserver {
    fn corners_changed(&mut self, event: &CornerEvent, corners: &[ImagePoint]);
}

/// Up to four image-space corner points in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CornerSet {
    points: Vec<ImagePoint>,
}

impl CornerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from existing points (e.g. a config preset)
    pub fn from_points(points: &[ImagePoint]) -> Result<Self> {
        if points.len() > QUAD_CORNERS {
            return Err(RectifyError::CornerSetFull);
        }
        Ok(Self {
            points: points.to_vec(),
        })
    }

    pub fn points(&self) -> &[ImagePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.points.len() == QUAD_CORNERS
    }

    /// The four corners as an array, if the set is complete
    pub fn quad(&self) -> Result<[ImagePoint; 4]> {
        match self.points.as_slice() {
            [a, b, c, d] => Ok([*a, *b, *c, *d]),
            other => Err(RectifyError::InsufficientCorners { got: other.len() }),
        }
    }

    pub fn add(&mut self, point: ImagePoint) -> Result<CornerEvent> {
        if self.is_complete() {
            return Err(RectifyError::CornerSetFull);
        }
        self.points.push(point);
        Ok(CornerEvent::Added {
            index: self.points.len() - 1,
            point,
        })
    }

    /// Drag an existing corner to a new position
    pub fn move_to(&mut self, index: usize, point: ImagePoint) -> Result<CornerEvent> {
        let len = self.points.len();
        let slot = self
            .points
            .get_mut(index)
            .ok_or(RectifyError::CornerIndexOutOfRange { index, len })?;
        *slot = point;
        Ok(CornerEvent::Moved { index, point })
    }

    pub fn remove(&mut self, index: usize) -> Result<CornerEvent> {
        let len = self.points.len();
        if index >= len {
            return Err(RectifyError::CornerIndexOutOfRange { index, len });
        }
        let point = self.points.remove(index);
        Ok(CornerEvent::Removed { index, point })
    }

    /// Swap in a whole new set of points
    pub fn replace(&mut self, points: &[ImagePoint]) -> Result<CornerEvent> {
        *self = Self::from_points(points)?;
        Ok(CornerEvent::Replaced {
            count: self.points.len(),
        })
    }

    pub fn clear(&mut self) -> CornerEvent {
        self.points.clear();
        CornerEvent::Cleared
    }

    /// Index of the first corner within `radius` (Manhattan, viewport px) of `cursor`
    pub fn hit_test(&self, view: &ViewTransform, cursor: ViewportPoint, radius: f64) -> Option<usize> {
        self.points
            .iter()
            .position(|p| view.to_viewport(*p).manhattan(&cursor) < radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewConfig;
    use crate::geometry::{ImageSize, ViewportSize};

    #[test]
    fn test_add_until_full() {
        let mut set = CornerSet::new();
        for i in 0..4 {
            let p = ImagePoint::new(i as f64, 0.0);
            assert_eq!(set.add(p).unwrap(), CornerEvent::Added { index: i, point: p });
        }
        assert!(set.is_complete());
        assert_eq!(set.add(ImagePoint::new(9.0, 9.0)), Err(RectifyError::CornerSetFull));
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn test_move_and_remove() {
        let mut set = CornerSet::from_points(&[ImagePoint::new(1.0, 1.0), ImagePoint::new(2.0, 2.0)]).unwrap();

        let moved = set.move_to(1, ImagePoint::new(5.0, 6.0)).unwrap();
        assert_eq!(moved, CornerEvent::Moved { index: 1, point: ImagePoint::new(5.0, 6.0) });

        let removed = set.remove(0).unwrap();
        assert_eq!(removed, CornerEvent::Removed { index: 0, point: ImagePoint::new(1.0, 1.0) });
        assert_eq!(set.points(), &[ImagePoint::new(5.0, 6.0)]);

        assert_eq!(
            set.remove(3),
            Err(RectifyError::CornerIndexOutOfRange { index: 3, len: 1 })
        );
        assert!(set.move_to(1, ImagePoint::default()).is_err());
    }

    #[test]
    fn test_quad_requires_four() {
        let mut set = CornerSet::new();
        set.add(ImagePoint::new(0.0, 0.0)).unwrap();
        assert_eq!(set.quad(), Err(RectifyError::InsufficientCorners { got: 1 }));
        assert_eq!(set.clear(), CornerEvent::Cleared);
        assert!(set.is_empty());

        let five = [ImagePoint::default(); 5];
        assert_eq!(set.replace(&five), Err(RectifyError::CornerSetFull));
        assert_eq!(set.replace(&five[..4]), Ok(CornerEvent::Replaced { count: 4 }));
        assert!(set.quad().is_ok());
    }

    #[test]
    fn test_hit_test_uses_viewport_distance() {
        let mut view = ViewTransform::new(ViewportSize::new(200.0, 200.0), ViewConfig::default());
        view.set_image(ImageSize::new(100, 100));
        // origin at (50, 50), scale 1
        let set = CornerSet::from_points(&[ImagePoint::new(10.0, 10.0), ImagePoint::new(20.0, 20.0)]).unwrap();

        assert_eq!(set.hit_test(&view, ViewportPoint::new(63.0, 64.0), 10.0), Some(0));
        assert_eq!(set.hit_test(&view, ViewportPoint::new(71.0, 70.0), 10.0), Some(1));
        assert_eq!(set.hit_test(&view, ViewportPoint::new(65.0, 65.0), 10.0), None);
    }

    #[test]
    fn test_event_json() {
        let event = CornerEvent::Added {
            index: 2,
            point: ImagePoint::new(1.5, 2.5),
        };
        let json = serde_json::to_value(event).unwrap();
        assert_eq!(json["kind"], "added");
        assert_eq!(json["index"], 2);
        assert_eq!(json["point"]["x"], 1.5);
    }
}
