//! Eye landmark overlay drawing
//!
//! Visual feedback only: dots on the six landmarks and a closed contour
//! around each eye, drawn onto the frame the polling client renders.

use camera_capture::VideoFrame;
use image::Rgb;
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

use crate::geometry::EyePoints;

const LANDMARK_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const CONTOUR_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const LANDMARK_RADIUS: i32 = 2;

/// Draw landmark dots and eye contours for both eyes onto the frame
pub fn draw_eye_overlays(frame: &mut VideoFrame, left: &EyePoints, right: &EyePoints) {
    let Some(mut img) = frame.to_rgb_image() else {
        return;
    };

    for eye in [left, right] {
        for &(x, y) in eye.iter() {
            draw_filled_circle_mut(&mut img, (x as i32, y as i32), LANDMARK_RADIUS, LANDMARK_COLOR);
        }
        for i in 0..eye.len() {
            let next = (i + 1) % eye.len();
            draw_line_segment_mut(
                &mut img,
                (eye[i].0, eye[i].1),
                (eye[next].0, eye[next].1),
                CONTOUR_COLOR,
            );
        }
    }

    frame.overwrite_from(img);
}
