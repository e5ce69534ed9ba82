//! Light emitters: point lights, spot and IES lights, and the sun.

use super::xml::{escape, fixed, real, rgb};
use crate::collect::{LightKind, LightPlacement};
use crate::error::Result;
use crate::scene::attributes::LightSettings;
use crate::scene::ShadowInfo;
use crate::types::{BoundingBox, Transform};
use glam::DVec3;
use std::io::Write;

/// Sun distance from the model centre, as a multiple of the largest
/// bound coordinate.
const SUN_DISTANCE_FACTOR: f64 = 50.0;

/// Number of lights written, per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LightCounts {
    pub point: usize,
    pub spot: usize,
}

/// The sun is switched on when the scene has no lights of its own, or
/// when shadows are displayed.
pub fn sun_enabled(lights: &[LightPlacement<'_>], shadow: &ShadowInfo) -> bool {
    lights.is_empty() || shadow.display_shadows
}

/// Write every light that is on at `time`: point lights first, then spots.
pub fn write_lights<W: Write>(
    out: &mut W,
    lights: &[LightPlacement<'_>],
    time: Option<f64>,
    scale: f64,
    ies_directory: &str,
) -> Result<LightCounts> {
    let mut counts = LightCounts::default();

    for light in lights.iter().filter(|l| l.kind == LightKind::Point) {
        let settings = light.config().point_settings();
        if settings.status_at(time).is_on() {
            write_point_light(out, light, &settings, scale)?;
            counts.point += 1;
        }
    }
    for light in lights.iter().filter(|l| l.kind == LightKind::Spot) {
        let settings = light.config().spot_settings();
        if settings.status_at(time).is_on() {
            write_spot_light(out, light, &settings, scale, ies_directory)?;
            counts.spot += 1;
        }
    }

    log::info!("Exported {} point lights and {} spot lights", counts.point, counts.spot);
    Ok(counts)
}

pub fn write_point_light<W: Write>(
    out: &mut W,
    light: &LightPlacement<'_>,
    settings: &LightSettings,
    scale: f64,
) -> Result<()> {
    let name = escape(&settings.name);
    writeln!(out, "<Object Identifier=\"./Lights/{}\" Label=\"Default Light\" Name=\"{}\" Type=\"Light\">", name, name)?;
    writeln!(out, "<Object Identifier=\"Omni Light\" Label=\"Omni Light\" Name=\"\" Type=\"Emittance\">")?;
    write_light_color(out, &rgb(light.color.unit()))?;
    writeln!(out, "<Parameter Name=\"Attenuation\" Type=\"String\" Value=\"{}\"/>", escape(&settings.attenuation))?;
    writeln!(out, "</Object>")?;
    write_light_flags(out, true, true, &real(settings.power))?;
    write_light_frame(out, &light.transform, scale)?;
    writeln!(out, "<Parameter Name=\"Focus Distance\" Type=\"Real\" Value=\"1\"/>")?;
    write_light_tail(out, "0")
}

/// Spot light, or an IES light when the light's name refers to an
/// `.ies` photometric file under `ies_directory`.
pub fn write_spot_light<W: Write>(
    out: &mut W,
    light: &LightPlacement<'_>,
    settings: &LightSettings,
    scale: f64,
    ies_directory: &str,
) -> Result<()> {
    let name = escape(&settings.name);
    let ies = name.to_uppercase().contains(".IES");

    writeln!(out, "<Object Identifier=\"./Lights/{}\" Label=\"Default Light\" Name=\"{}\" Type=\"Light\">", name, name)?;
    if ies {
        writeln!(out, "<Object Identifier=\"IES Light\" Label=\"IES Light\" Name=\"\" Type=\"Emittance\">")?;
    } else {
        writeln!(out, "<Object Identifier=\"Spot Light\" Label=\"Spot Light\" Name=\"\" Type=\"Emittance\">")?;
    }
    write_light_color(out, &rgb(light.color.unit()))?;
    if ies {
        writeln!(out, "<Parameter Name=\"Filename\" Type=\"File\" Value=\"{}/{}\"/>", escape(ies_directory), name)?;
        writeln!(out, "<Parameter Name=\"Attenuation\" Type=\"String\" Value=\"Inverse Square\"/>")?;
    } else {
        writeln!(out, "<Parameter Name=\"Attenuation\" Type=\"String\" Value=\"{}\"/>", escape(&settings.attenuation))?;
        writeln!(out, "<Parameter Name=\"Fall Off\" Type=\"Real\" Value=\"{}\"/>", real(settings.fall_off))?;
        writeln!(out, "<Parameter Name=\"Hot Spot\" Type=\"Real\" Value=\"{}\"/>", real(settings.hot_spot))?;
    }
    writeln!(out, "</Object>")?;
    write_light_flags(out, true, true, &real(settings.power))?;
    write_light_frame(out, &light.transform, scale)?;
    let focus = settings.focus_distance.map_or_else(|| "1".to_string(), real);
    writeln!(out, "<Parameter Name=\"Focus Distance\" Type=\"Real\" Value=\"{}\"/>", focus)?;
    write_light_tail(out, "0")
}

/// Omni light standing in for the sun, placed far out along the sun
/// direction from the centre of the model.
pub fn write_sun<W: Write>(
    out: &mut W,
    shadow: &ShadowInfo,
    bounds: Option<&BoundingBox>,
    enabled: bool,
    scale: f64,
) -> Result<()> {
    let position = sun_position(shadow.sun_direction, bounds) * scale;

    writeln!(out, "<Object Identifier=\"./Lights/Sun\" Label=\"Default Light\" Name=\"Sun\" Type=\"Light\">")?;
    writeln!(out, "<Object Identifier=\"Omni Light\" Label=\"Omni Light\" Name=\"\" Type=\"Emittance\">")?;
    write_light_color(out, "1 1 1")?;
    writeln!(out, "<Parameter Name=\"Attenuation\" Type=\"String\" Value=\"None\"/>")?;
    writeln!(out, "</Object>")?;
    write_light_flags(out, enabled, false, "3.0")?;
    writeln!(
        out,
        "<Parameter Name=\"Frame\" Type=\"Transform\" Value=\"1 0 0 {} 0 1 0 {} 0 0 1 {}\"/>",
        real(position.x),
        real(position.y),
        real(position.z)
    )?;
    writeln!(out, "<Parameter Name=\"Focus Distance\" Type=\"Real\" Value=\"4\"/>")?;
    write_light_tail(out, "0.2")?;

    log::info!("Sun and physical sky exported and turned {}", if enabled { "ON" } else { "OFF" });
    Ok(())
}

/// Sun position in model units. An empty model puts the sun at the origin.
pub fn sun_position(sun_direction: DVec3, bounds: Option<&BoundingBox>) -> DVec3 {
    let Some(bounds) = bounds else {
        return DVec3::ZERO;
    };
    let reach = bounds.max.x.max(bounds.max.y).max(bounds.max.z) * SUN_DISTANCE_FACTOR;
    bounds.center() + sun_direction.normalize_or_zero() * reach
}

fn write_light_color<W: Write>(out: &mut W, color: &str) -> Result<()> {
    writeln!(out, "<Object Identifier=\"./Radiance/Constant Texture\" Label=\"Constant Texture\" Name=\"\" Type=\"Texture\">")?;
    writeln!(out, "<Parameter Name=\"Color\" Type=\"RGB\" Value=\"{}\" />", color)?;
    writeln!(out, "</Object>")?;
    Ok(())
}

fn write_light_flags<W: Write>(out: &mut W, enabled: bool, soft_shadow: bool, multiplier: &str) -> Result<()> {
    writeln!(out, "<Parameter Name=\"Enabled\" Type=\"Boolean\" Value=\"{}\"/>", u8::from(enabled))?;
    writeln!(out, "<Parameter Name=\"Shadow\" Type=\"Boolean\" Value=\"1\"/>")?;
    writeln!(out, "<Parameter Name=\"Soft Shadow\" Type=\"Boolean\" Value=\"{}\"/>", u8::from(soft_shadow))?;
    writeln!(out, "<Parameter Name=\"Negative Light\" Type=\"Boolean\" Value=\"0\"/>")?;
    writeln!(out, "<Parameter Name=\"Global Photons\" Type=\"Boolean\" Value=\"1\"/>")?;
    writeln!(out, "<Parameter Name=\"Caustic Photons\" Type=\"Boolean\" Value=\"1\"/>")?;
    writeln!(out, "<Parameter Name=\"Multiplier\" Type=\"Real\" Value=\"{}\"/>", multiplier)?;
    Ok(())
}

/// Orientation and position of a light. The renderer's lights point down
/// their local Z, so the host Z axis is negated.
fn write_light_frame<W: Write>(out: &mut W, transform: &Transform, scale: f64) -> Result<()> {
    let x = transform.x_axis().normalize_or_zero();
    let y = transform.y_axis().normalize_or_zero();
    let z = -transform.z_axis().normalize_or_zero();
    let origin = transform.origin() * scale;

    write!(out, "<Parameter Name=\"Frame\" Type=\"Transform\" Value=\"")?;
    writeln!(out, "{} {} {} {}", fixed(x.x, 4), fixed(y.x, 4), fixed(z.x, 4), fixed(origin.x, 4))?;
    writeln!(out, "{} {} {} {}", fixed(x.y, 4), fixed(y.y, 4), fixed(z.y, 4), fixed(origin.y, 4))?;
    writeln!(out, "{} {} {} {}", fixed(x.z, 4), fixed(y.z, 4), fixed(z.z, 4), fixed(origin.z, 4))?;
    writeln!(out, "\"/>")?;
    Ok(())
}

fn write_light_tail<W: Write>(out: &mut W, radius: &str) -> Result<()> {
    writeln!(out, "<Parameter Name=\"Radius\" Type=\"Real\" Value=\"{}\"/>", radius)?;
    writeln!(out, "<Parameter Name=\"Shadow Color\" Type=\"RGB\" Value=\"0 0 0\"/>")?;
    writeln!(out, "</Object>")?;
    Ok(())
}
