//! Pinhole cameras for the current view and saved pages.

use super::xml::{escape, fixed};
use crate::error::Result;
use crate::scene::{Camera, Scene};
use std::io::Write;

/// Name of the camera made from the active view; also the active camera.
pub const CURRENT_VIEW: &str = "## Current View ##";

/// Film width the host's focal length is relative to, in millimetres.
const FILM_WIDTH_MM: f64 = 36.0;

/// Write the current view camera followed by one camera per page that
/// stores one. Returns the number of cameras written.
///
/// `resolution` overrides the `WIDTHxHEIGHT` viewport size.
pub fn write_cameras<W: Write>(
    out: &mut W,
    scene: &Scene,
    resolution: Option<&str>,
    scale: f64,
) -> Result<usize> {
    let viewport = format!("{}x{}", scene.view.width, scene.view.height);
    let resolution = resolution.unwrap_or(&viewport);

    write_camera(out, CURRENT_VIEW, &scene.view.camera, resolution, scale)?;
    let mut count = 1;
    for page in &scene.pages {
        if let Some(camera) = &page.camera {
            write_camera(out, &page.name, camera, &viewport, scale)?;
            count += 1;
        }
    }
    Ok(count)
}

pub fn write_camera<W: Write>(
    out: &mut W,
    name: &str,
    camera: &Camera,
    resolution: &str,
    scale: f64,
) -> Result<()> {
    let (focal, projection) = if camera.perspective {
        (camera.focal_length / FILM_WIDTH_MM, "Planar")
    } else {
        (camera.height * scale, "Parallel")
    };
    let name = escape(name);
    let right = camera.x_axis.normalize_or_zero();
    let down = -camera.y_axis.normalize_or_zero();
    let target = camera.z_axis.normalize_or_zero();
    let eye = camera.eye * scale;

    writeln!(out, "<Object Identifier=\"./Cameras/{}\" Label=\"Pinhole Camera\" Name=\"{}\" Type=\"Camera\">", name, name)?;
    writeln!(out, "<Parameter Name=\"Focal Length\" Type=\"Real\" Value=\"{}\" />", fixed(focal, 4))?;
    writeln!(out, "<Parameter Name=\"Resolution\" Type=\"String\" Value=\"{}\"/>", resolution)?;
    write!(out, "<Parameter Name=\"Frame\" Type=\"Transform\" Value=\"")?;
    writeln!(out, "{} {} {} {}", fixed(right.x, 4), fixed(down.x, 4), fixed(target.x, 4), fixed(eye.x, 4))?;
    writeln!(out, "{} {} {} {}", fixed(right.y, 4), fixed(down.y, 4), fixed(target.y, 4), fixed(eye.y, 4))?;
    writeln!(out, "{} {} {} {}", fixed(right.z, 4), fixed(down.z, 4), fixed(target.z, 4), fixed(eye.z, 4))?;
    writeln!(out, "\"/>")?;
    writeln!(out, "<Parameter Name=\"Focus Distance\" Type=\"Real\" Value=\"1\"/>")?;
    writeln!(out, "<Parameter Name=\"Projection\" Type=\"String\" Value=\"{}\"/>", projection)?;
    writeln!(out, "</Object>")?;
    Ok(())
}
