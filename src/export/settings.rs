//! Kernel settings, the scene object and the sky.

use super::camera::CURRENT_VIEW;
use super::xml::{escape, fixed};
use crate::error::Result;
use crate::scene::ShadowInfo;
use chrono::{Datelike, Timelike};
use glam::DVec3;
use std::io::Write;
use std::path::Path;

const ROOT: &str = "<Root Label=\"Default Kernel\" Name=\"\" Type=\"Kernel\">";

/// Renderer settings written when no custom settings file is given.
const DEFAULT_KERNEL_SETTINGS: &str = r#"<Object Identifier="./Modellers/XML Modeller" Label="XML Modeller" Name="XML Modeller" Type="Modeller">
</Object>
<Object Identifier="./Ray Tracers/Standard Ray Tracer" Label="Standard Ray Tracer" Name="Standard Ray Tracer" Type="Ray Tracer">
	<Parameter Name="Rasterization" Type="String" Value="Auto"/>
	<Parameter Name="Antialiasing" Type="String" Value="Production AA"/>
	<Parameter Name="Antialiasing Filter" Type="String" Value="Mitchell-Netravali 0.5 0.8"/>
	<Parameter Name="Antialiasing Threshold" Type="Real" Value="0.3"/>
	<Parameter Name="Texture Filtering" Type="Boolean" Value="1"/>
	<Parameter Name="Brightness Threshold" Type="Real" Value="0.001"/>
	<Parameter Name="Max Ray Tracing Depth" Type="Integer" Value="5"/>
	<Parameter Name="Irradiance Scale" Type="RGB" Value="1 1 1"/>
	<Parameter Name="Linear Lightflow" Type="Boolean" Value="1"/>
	<Parameter Name="./Sampling Criteria/Diffuse Samples" Type="Integer" Value="64"/>
	<Parameter Name="./Sampling Criteria/Specular Samples" Type="Integer" Value="8"/>
	<Parameter Name="./Sampling Criteria/Dispersion Samples" Type="Boolean" Value="1"/>
	<Parameter Name="./Sampling Criteria/Trace Diffusers" Type="Boolean" Value="0"/>
	<Parameter Name="./Sampling Criteria/Trace Translucencies" Type="Boolean" Value="0"/>
	<Parameter Name="./Sampling Criteria/Trace Fuzzy Reflections" Type="Boolean" Value="1"/>
	<Parameter Name="./Sampling Criteria/Trace Fuzzy Refractions" Type="Boolean" Value="1"/>
	<Parameter Name="./Sampling Criteria/Trace Reflections" Type="Boolean" Value="1"/>
	<Parameter Name="./Sampling Criteria/Trace Refractions" Type="Boolean" Value="1"/>
	<Parameter Name="./Sampling Criteria/Random Generator" Type="String" Value="Pure"/>
</Object>
<Object Identifier="./Irradiance Estimators/Diffuse Interreflection" Label="Diffuse Interreflection" Name="Diffuse Interreflection" Type="Irradiance Estimator">
	<Parameter Name="Enabled" Type="Boolean" Value="1"/>
	<Parameter Name="Max Recursion Depth" Type="Integer" Value="1"/>
	<Parameter Name="Max Ray Tracing Depth" Type="Integer" Value="5"/>
	<Parameter Name="Final Gathering Rays" Type="Integer" Value="500"/>
	<Parameter Name="Light Sampling" Type="Boolean" Value="1"/>
	<Parameter Name="Ambient Lighting" Type="Boolean" Value="0"/>
	<Parameter Name="Accuracy" Type="Real" Value="0.25"/>
	<Parameter Name="Minimum Pixel Reuse" Type="Real" Value="2.5"/>
	<Parameter Name="Maximum Pixel Reuse" Type="Real" Value="0"/>
	<Parameter Name="Radiance Limit" Type="Real" Value="0.3"/>
	<Parameter Name="Secondary Estimator" Type="String" Value="Density Estimation"/>
</Object>
<Object Identifier="./Irradiance Estimators/Density Estimation" Label="Density Estimation" Name="Density Estimation" Type="Irradiance Estimator">
	<Parameter Name="Enabled" Type="Boolean" Value="1"/>
	<Parameter Name="Direct Lighting" Type="Boolean" Value="1"/>
	<Parameter Name="Max Photon Tracing Depth" Type="Integer" Value="6"/>
	<Parameter Name="Terminating Brightness" Type="Real" Value="0.01"/>
	<Parameter Name="Samples per Light" Type="Integer" Value="100000"/>
	<Parameter Name="Sample Sky" Type="Boolean" Value="1"/>
	<Parameter Name="./Sampling Criteria/Diffuse Samples" Type="Integer" Value="1"/>
	<Parameter Name="./Sampling Criteria/Specular Samples" Type="Integer" Value="0"/>
	<Parameter Name="./Sampling Criteria/Dispersion Samples" Type="Boolean" Value="0"/>
	<Parameter Name="./Sampling Criteria/Trace Reflections" Type="Boolean" Value="1"/>
	<Parameter Name="./Sampling Criteria/Trace Refractions" Type="Boolean" Value="1"/>
	<Parameter Name="./Sampling Criteria/Importance Sampling" Type="Boolean" Value="1"/>
	<Parameter Name="./Sampling Criteria/Russian Roulette" Type="Boolean" Value="0"/>
</Object>
<Object Identifier="./Direct Light Estimators/Refraction Enhanced" Label="Refraction Enhanced" Name="Refraction Enhanced" Type="Direct Light Estimator">
	<Parameter Name="Enabled" Type="Boolean" Value="1"/>
	<Parameter Name="PseudoCaustics" Type="Boolean" Value="0"/>
	<Parameter Name="Antialiasing" Type="String" Value="Low"/>
	<Parameter Name="Optimized Area Lights" Type="Boolean" Value="1"/>
</Object>
<Object Identifier="./Environments/Octree Environment" Label="Octree Environment" Name="Octree Environment" Type="Environment">
	<Parameter Name="Max Objects per Cell" Type="Integer" Value="20"/>
</Object>
<Object Identifier="./Filters/Simple Tone Mapping" Label="Simple Tone Mapping" Name="" Type="Filter">
	<Parameter Name="Enabled" Type="Boolean" Value="1"/>
	<Parameter Name="Method" Type="String" Value="Simple"/>
	<Parameter Name="Exposure" Type="Real" Value="1"/>
	<Parameter Name="Gamma Correction" Type="Real" Value="2.2"/>
</Object>
"#;

/// Open the document with the default kernel settings and the scene object.
pub fn write_header<W: Write>(out: &mut W, model_name: &str) -> Result<()> {
    writeln!(out, "{}", ROOT)?;
    out.write_all(DEFAULT_KERNEL_SETTINGS.as_bytes())?;
    write_scene_object(out, model_name)
}

/// Open the document with kernel settings taken from a saved settings
/// file. The file's own `<Root>` delimiter lines are dropped.
///
/// The file is read completely before anything is written, so a read
/// failure leaves `out` untouched.
pub fn write_custom_header<W: Write>(out: &mut W, model_name: &str, settings_file: &Path) -> Result<()> {
    let body = std::fs::read_to_string(settings_file)?;
    writeln!(out, "{}", ROOT)?;
    for line in body.lines() {
        let trimmed = line.trim_start().to_lowercase();
        if !trimmed.starts_with("<root") && !trimmed.starts_with("</root") {
            writeln!(out, "{}", line)?;
        }
    }
    write_scene_object(out, model_name)
}

fn write_scene_object<W: Write>(out: &mut W, model_name: &str) -> Result<()> {
    let name = escape(model_name);
    writeln!(out, "<Object Identifier=\"./Scenes/{}\" Label=\"Default Scene\" Name=\"{}\" Type=\"Scene\">", name, name)?;
    Ok(())
}

/// Close the scene object and the document, selecting the current view.
pub fn write_finish<W: Write>(out: &mut W) -> Result<()> {
    writeln!(out, "<Parameter Name=\"./Cameras/Active\" Type=\"String\" Value=\"{}\"/>", CURRENT_VIEW)?;
    writeln!(out, "</Object>")?;
    writeln!(out, "</Root>")?;
    Ok(())
}

/// Global settings with the physical sky and location.
///
/// The sky frame turns the host axes by the north angle; the sun direction
/// turns the opposite way.
pub fn write_sky<W: Write>(out: &mut W, shadow: &ShadowInfo, sun_enabled: bool) -> Result<()> {
    let background = if sun_enabled { "Physical Sky" } else { "Background Color" };
    let north = shadow.north_angle.to_radians();
    let ptx = rotate_z(DVec3::X, -north);
    let pty = rotate_z(DVec3::Y, -north);
    let sun = rotate_z(shadow.sun_direction, north);
    let location = Location::from_shadow_info(shadow);

    writeln!(out, "<Object Identifier=\"Default Global Settings\" Label=\"Default Global Settings\" Name=\"\" Type=\"Global Settings\">")?;
    writeln!(out, "\t<Parameter Name=\"Ambient Light\" Type=\"RGB\" Value=\"0 0 0\"/>")?;
    writeln!(out, "\t<Parameter Name=\"Background Color\" Type=\"RGB\" Value=\"0 0 0\"/>")?;
    writeln!(out, "\t<Parameter Name=\"Compute Volume Transfer\" Type=\"Boolean\" Value=\"0\"/>")?;
    writeln!(out, "\t<Parameter Name=\"Transfer Recursion Depth\" Type=\"Integer\" Value=\"1\"/>")?;
    writeln!(out, "\t<Parameter Name=\"Background Type\" Type=\"String\" Value=\"{}\"/>", background)?;
    writeln!(out, "\t<Parameter Name=\"Sky Intensity\" Type=\"Real\" Value=\"1\"/>")?;
    writeln!(
        out,
        "\t<Parameter Name=\"Sky Frame\" Type=\"Transform\" Value=\"{} {} 0 0 {} {} 0 0 {} {} 1 0\"/>",
        fixed(ptx.x, 4),
        fixed(pty.x, 4),
        fixed(ptx.y, 4),
        fixed(pty.y, 4),
        fixed(ptx.z, 4),
        fixed(pty.z, 4)
    )?;
    writeln!(
        out,
        "\t<Parameter Name=\"Sun Direction\" Type=\"String\" Value=\"{} {} {}\"/>",
        fixed(sun.x, 4),
        fixed(sun.y, 4),
        fixed(sun.z, 4)
    )?;
    writeln!(out, "\t<Parameter Name=\"Sky Turbidity\" Type=\"Real\" Value=\"2\"/>")?;
    writeln!(out, "\t<Parameter Name=\"./Location/Latitude\" Type=\"Real\" Value=\"{}\"/>", fixed(location.latitude, 4))?;
    writeln!(out, "\t<Parameter Name=\"./Location/Longitude\" Type=\"Real\" Value=\"{}\"/>", fixed(location.longitude, 4))?;
    writeln!(out, "\t<Parameter Name=\"./Location/Timezone\" Type=\"Integer\" Value=\"{}\"/>", fixed(location.tz_offset, 0))?;
    writeln!(out, "\t<Parameter Name=\"./Location/Date\" Type=\"String\" Value=\"{}\"/>", location.date)?;
    writeln!(out, "\t<Parameter Name=\"./Location/Time\" Type=\"String\" Value=\"{}\"/>", location.time)?;
    writeln!(out, "</Object>")?;
    Ok(())
}

/// Geographic location in the renderer's conventions.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    /// Hours from UTC; offsets beyond twelve hours are reset to zero.
    pub tz_offset: f64,
    /// `day/month/year` with zero-based day and month.
    pub date: String,
    /// `hour:minute:second`, unpadded.
    pub time: String,
}

impl Location {
    pub fn from_shadow_info(shadow: &ShadowInfo) -> Self {
        let t = shadow.shadow_time;
        let tz_offset = if shadow.tz_offset.abs() > 12.0 { 0.0 } else { shadow.tz_offset };
        Self {
            latitude: shadow.latitude,
            longitude: shadow.longitude,
            tz_offset,
            date: format!("{}/{}/{}", t.day0(), t.month0(), t.year()),
            time: format!("{}:{}:{}", t.hour(), t.minute(), t.second()),
        }
    }
}

fn rotate_z(v: DVec3, angle: f64) -> DVec3 {
    let (sin, cos) = angle.sin_cos();
    DVec3::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos, v.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn text(out: Vec<u8>) -> String {
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_default_header() {
        let mut out = Vec::new();
        write_header(&mut out, "House & Garden").unwrap();
        let xml = text(out);
        assert!(xml.starts_with("<Root Label=\"Default Kernel\" Name=\"\" Type=\"Kernel\">\n<Object Identifier=\"./Modellers/XML Modeller\""));
        assert!(xml.contains("Name=\"Gamma Correction\" Type=\"Real\" Value=\"2.2\"/>"));
        assert!(xml.ends_with(
            "<Object Identifier=\"./Scenes/House &amp; Garden\" Label=\"Default Scene\" Name=\"House &amp; Garden\" Type=\"Scene\">\n"
        ));
    }

    #[test]
    fn test_custom_header_strips_root_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  <ROOT Label=\"Kernel\">").unwrap();
        writeln!(file, "<Object Identifier=\"./Custom\">").unwrap();
        writeln!(file, "</Object>").unwrap();
        writeln!(file, "</Root>").unwrap();

        let mut out = Vec::new();
        write_custom_header(&mut out, "model", file.path()).unwrap();
        let lines: Vec<String> = text(out).lines().map(str::to_string).collect();
        assert_eq!(
            lines,
            vec![
                ROOT.to_string(),
                "<Object Identifier=\"./Custom\">".to_string(),
                "</Object>".to_string(),
                "<Object Identifier=\"./Scenes/model\" Label=\"Default Scene\" Name=\"model\" Type=\"Scene\">".to_string(),
            ]
        );
    }

    #[test]
    fn test_missing_settings_file_writes_nothing() {
        let mut out = Vec::new();
        let result = write_custom_header(&mut out, "model", Path::new("/nonexistent/settings.xml"));
        assert!(result.is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn test_finish() {
        let mut out = Vec::new();
        write_finish(&mut out).unwrap();
        assert_eq!(
            text(out),
            "<Parameter Name=\"./Cameras/Active\" Type=\"String\" Value=\"## Current View ##\"/>\n</Object>\n</Root>\n"
        );
    }

    #[test]
    fn test_location() {
        let shadow = ShadowInfo {
            latitude: 51.5,
            longitude: -0.12,
            tz_offset: 14.0,
            shadow_time: Utc.with_ymd_and_hms(2008, 1, 1, 9, 5, 0).unwrap(),
            ..Default::default()
        };
        let location = Location::from_shadow_info(&shadow);
        assert_eq!(location.tz_offset, 0.0);
        assert_eq!(location.date, "0/0/2008");
        assert_eq!(location.time, "9:5:0");
    }

    #[test]
    fn test_sky_north_rotation() {
        let shadow = ShadowInfo {
            north_angle: 90.0,
            sun_direction: DVec3::X,
            ..Default::default()
        };
        let mut out = Vec::new();
        write_sky(&mut out, &shadow, true).unwrap();
        let xml = text(out);
        assert!(xml.contains("Value=\"Physical Sky\"/>"));
        assert!(xml.contains("Value=\"0.0000 1.0000 0 0 -1.0000 0.0000 0 0 0.0000 0.0000 1 0\"/>"));
        assert!(xml.contains("<Parameter Name=\"Sun Direction\" Type=\"String\" Value=\"0.0000 1.0000 0.0000\"/>"));
        assert!(xml.contains("<Parameter Name=\"./Location/Date\" Type=\"String\" Value=\"7/10/2002\"/>"));
        assert!(xml.contains("<Parameter Name=\"./Location/Time\" Type=\"String\" Value=\"13:30:0\"/>"));

        let mut out = Vec::new();
        write_sky(&mut out, &ShadowInfo::default(), false).unwrap();
        assert!(text(out).contains("Value=\"Background Color\"/>"));
    }
}
