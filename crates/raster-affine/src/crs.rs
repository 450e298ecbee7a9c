//! Parses a TIFF `GeoKeyDirectory` into either an EPSG code or a PROJJSON object.
//!
//! Follows the GeoKeyDirectory walk in `cog/decoder.rs` (`read_projection_info`) and
//! `martin-core`'s `tiles::cog::model::ModelInfo::decode`, both of which chunk the raw `u16`
//! key directory into 4-tuples and dispatch on key id. Out-of-line `GeoDouble`-valued keys
//! (tag 34736, `GeoDoubleParamsTag`) are resolved the way
//! `kellpossible-avalanche-report/geo/src/geotiff.rs` reads them: the directory entry's
//! `value_or_offset` is an index into a separately fetched `f64` array, not an inline value.

use serde::Serialize;

use crate::error::AffineError;
use crate::Result;

/// `tiff_tag_location` value marking a GeoKey entry whose value lives in `GeoDoubleParamsTag`
/// (34736) rather than inline in `value_or_offset`.
const GEO_DOUBLE_PARAMS_TAG: u16 = 34736;

/// GeoKey id 1024 ("GTModelTypeGeoKey").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelType {
    Projected,
    Geographic,
    Geocentric,
}

impl ModelType {
    fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(ModelType::Projected),
            2 => Some(ModelType::Geographic),
            3 => Some(ModelType::Geocentric),
            _ => None,
        }
    }
}

/// GeoKey id 3075 ("ProjCoordTransGeoKey") — the subset of OGC 19-008 projection methods this
/// parser recognises well enough to describe in a PROJJSON `conversion.method`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjMethod {
    TransverseMercator,
    TransverseMercatorSouthOrientated,
    HotineObliqueMercatorVariantB,
    MercatorVariantA,
    LambertConicConformal1SP,
    LambertConicConformal2SP,
    LambertAzimuthalEqualArea,
    AlbersEqualArea,
    EquidistantStereographic,
    PolarStereographic,
    ObliqueStereographic,
    EquidistantCylindrical,
    CassiniSoldner,
    Polyconic,
    Sinusoidal,
    Orthographic,
    AzimuthalEquidistant,
    NewZealandMapGrid,
}

impl ProjMethod {
    fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            1 => ProjMethod::TransverseMercator,
            2 => ProjMethod::TransverseMercatorSouthOrientated,
            3 => ProjMethod::ObliqueStereographic,
            5 => ProjMethod::EquidistantCylindrical,
            6 => ProjMethod::CassiniSoldner,
            8 => ProjMethod::AlbersEqualArea,
            9 => ProjMethod::LambertConicConformal1SP,
            10 => ProjMethod::AlbersEqualArea,
            11 => ProjMethod::LambertAzimuthalEqualArea,
            14 => ProjMethod::MercatorVariantA,
            15 => ProjMethod::LambertConicConformal2SP,
            17 => ProjMethod::HotineObliqueMercatorVariantB,
            18 => ProjMethod::NewZealandMapGrid,
            20 => ProjMethod::PolarStereographic,
            22 => ProjMethod::Polyconic,
            24 => ProjMethod::Orthographic,
            25 => ProjMethod::Sinusoidal,
            27 => ProjMethod::EquidistantStereographic,
            28 => ProjMethod::AzimuthalEquidistant,
            _ => return None,
        })
    }

    fn name(&self) -> &'static str {
        match self {
            ProjMethod::TransverseMercator => "Transverse Mercator",
            ProjMethod::TransverseMercatorSouthOrientated => "Transverse Mercator (South Orientated)",
            ProjMethod::HotineObliqueMercatorVariantB => "Hotine Oblique Mercator (variant B)",
            ProjMethod::MercatorVariantA => "Mercator (variant A)",
            ProjMethod::LambertConicConformal1SP => "Lambert Conic Conformal (1SP)",
            ProjMethod::LambertConicConformal2SP => "Lambert Conic Conformal (2SP)",
            ProjMethod::LambertAzimuthalEqualArea => "Lambert Azimuthal Equal Area",
            ProjMethod::AlbersEqualArea => "Albers Equal Area",
            ProjMethod::EquidistantStereographic => "Equidistant Stereographic",
            ProjMethod::PolarStereographic => "Polar Stereographic",
            ProjMethod::ObliqueStereographic => "Oblique Stereographic",
            ProjMethod::EquidistantCylindrical => "Equidistant Cylindrical",
            ProjMethod::CassiniSoldner => "Cassini-Soldner",
            ProjMethod::Polyconic => "American Polyconic",
            ProjMethod::Sinusoidal => "Sinusoidal",
            ProjMethod::Orthographic => "Orthographic",
            ProjMethod::AzimuthalEquidistant => "Azimuthal Equidistant",
            ProjMethod::NewZealandMapGrid => "New Zealand Map Grid",
        }
    }

    /// Named conversion parameters this method takes, paired with the GeoKey accessor that
    /// supplies each one. Keys absent from the directory are dropped, not defaulted to zero.
    fn parameters(&self, dir: &GeoKeyDirectory) -> Vec<ConversionParameter> {
        let candidates: Vec<(&str, Option<f64>)> = match self {
            ProjMethod::AlbersEqualArea | ProjMethod::LambertConicConformal2SP => vec![
                ("lat_false_origin", dir.lat_false_origin()),
                ("lon_false_origin", dir.lon_false_origin()),
                ("lat_std_1", dir.lat_std_1()),
                ("lat_std_2", dir.lat_std_2()),
                ("false_easting", dir.false_easting()),
                ("false_northing", dir.false_northing()),
            ],
            ProjMethod::LambertConicConformal1SP
            | ProjMethod::TransverseMercator
            | ProjMethod::TransverseMercatorSouthOrientated
            | ProjMethod::MercatorVariantA
            | ProjMethod::ObliqueStereographic
            | ProjMethod::PolarStereographic => vec![
                ("lat_natural_origin", dir.lat_natural_origin()),
                ("lon_natural_origin", dir.lon_natural_origin()),
                ("scale_factor", dir.scale_at_natural_origin()),
                ("false_easting", dir.false_easting()),
                ("false_northing", dir.false_northing()),
            ],
            ProjMethod::LambertAzimuthalEqualArea
            | ProjMethod::AzimuthalEquidistant
            | ProjMethod::Orthographic
            | ProjMethod::EquidistantStereographic => vec![
                ("lat_center", dir.lat_center()),
                ("lon_center", dir.lon_center()),
                ("false_easting", dir.false_easting()),
                ("false_northing", dir.false_northing()),
            ],
            ProjMethod::HotineObliqueMercatorVariantB => vec![
                ("lat_center", dir.lat_center()),
                ("lon_center", dir.lon_center()),
                ("azimuth", dir.azimuth()),
                ("scale_factor", dir.scale_at_center()),
                ("false_easting", dir.center_easting()),
                ("false_northing", dir.center_northing()),
            ],
            ProjMethod::EquidistantCylindrical
            | ProjMethod::CassiniSoldner
            | ProjMethod::Polyconic
            | ProjMethod::Sinusoidal
            | ProjMethod::NewZealandMapGrid => vec![
                ("lat_natural_origin", dir.lat_natural_origin()),
                ("lon_natural_origin", dir.lon_natural_origin()),
                ("false_easting", dir.false_easting()),
                ("false_northing", dir.false_northing()),
            ],
        };
        candidates.into_iter().filter_map(|(name, value)| value.map(|value| ConversionParameter { name: name.to_string(), value })).collect()
    }
}

/// GeoKey id 3076/2052 ("ProjLinearUnitsGeoKey"/"GeogLinearUnitsGeoKey").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinearUnit {
    Metre,
    Foot,
    UsSurveyFoot,
}

impl LinearUnit {
    fn from_epsg_unit_code(code: u16) -> Option<Self> {
        match code {
            9001 => Some(LinearUnit::Metre),
            9002 => Some(LinearUnit::Foot),
            9003 => Some(LinearUnit::UsSurveyFoot),
            _ => None,
        }
    }

    /// Conversion factor to metres.
    pub fn to_metres_factor(&self) -> f64 {
        match self {
            LinearUnit::Metre => 1.0,
            LinearUnit::Foot => 0.3048,
            LinearUnit::UsSurveyFoot => 1200.0 / 3937.0,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            LinearUnit::Metre => "metre",
            LinearUnit::Foot => "foot",
            LinearUnit::UsSurveyFoot => "US survey foot",
        }
    }

    fn as_unit(&self) -> Unit {
        Unit { name: self.name().to_string(), conversion_factor: self.to_metres_factor() }
    }
}

/// GeoKey id 2054 ("GeogAngularUnitsGeoKey").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AngularUnit {
    Degree,
    Radian,
    Grad,
}

impl AngularUnit {
    fn from_epsg_unit_code(code: u16) -> Option<Self> {
        match code {
            9102 => Some(AngularUnit::Degree),
            9101 => Some(AngularUnit::Radian),
            9105 => Some(AngularUnit::Grad),
            _ => None,
        }
    }

    /// Conversion factor to radians.
    pub fn to_radians_factor(&self) -> f64 {
        match self {
            AngularUnit::Degree => std::f64::consts::PI / 180.0,
            AngularUnit::Radian => 1.0,
            AngularUnit::Grad => std::f64::consts::PI / 200.0,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            AngularUnit::Degree => "degree",
            AngularUnit::Radian => "radian",
            AngularUnit::Grad => "grad",
        }
    }

    fn as_unit(&self) -> Unit {
        Unit { name: self.name().to_string(), conversion_factor: self.to_radians_factor() }
    }
}

/// A named unit of measure, carrying its conversion factor to the unit's SI base (metres for
/// linear units, radians for angular ones) so a consumer never has to re-derive it from `name`.
#[derive(Debug, Clone, Serialize)]
pub struct Unit {
    pub name: String,
    pub conversion_factor: f64,
}

/// One named projection parameter (e.g. `lat_std_1`, `false_easting`), matching the way
/// PROJJSON represents a conversion's parameter list.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionParameter {
    pub name: String,
    pub value: f64,
}

/// A minimal PROJJSON-shaped description, enough to round-trip the GeoKeys this parser could
/// not reduce to a bare EPSG code.
#[derive(Debug, Clone, Serialize)]
pub struct ProjJsonCrs {
    #[serde(rename = "type")]
    pub crs_type: &'static str,
    pub name: String,
    pub base_crs: Option<BaseCrs>,
    pub conversion: Option<Conversion>,
    pub linear_unit: Option<Unit>,
    pub angular_unit: Option<Unit>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BaseCrs {
    pub geographic_epsg: Option<u32>,
    pub semi_major_axis: Option<f64>,
    pub semi_minor_axis: Option<f64>,
    pub inverse_flattening: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Conversion {
    pub method: String,
    pub parameters: Vec<ConversionParameter>,
}

/// Either a plain EPSG code, or a PROJJSON description when the GeoKeys describe a CRS that
/// does not reduce to a single registry code.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Crs {
    Epsg(u32),
    Projjson(ProjJsonCrs),
}

/// The raw `u16` payload of tag 34735 ("GeoKeyDirectoryTag"), still in its on-disk
/// chunks-of-4 layout: `[key_id, tiff_tag_location, count, value_or_offset]`, paired with the
/// `GeoDoubleParamsTag` (34736) array that out-of-line `GeoDouble`-valued keys index into.
pub struct GeoKeyDirectory<'a> {
    raw: &'a [u16],
    doubles: &'a [f64],
}

impl<'a> GeoKeyDirectory<'a> {
    pub fn new(raw: &'a [u16], doubles: &'a [f64]) -> Self {
        GeoKeyDirectory { raw, doubles }
    }

    fn entries(&self) -> impl Iterator<Item = [u16; 4]> + '_ {
        // raw[0..4] is the header: [key_directory_version, key_revision, minor_revision, num_keys]
        self.raw[4..].chunks_exact(4).map(|c| [c[0], c[1], c[2], c[3]])
    }

    fn find(&self, key_id: u16) -> Option<u16> {
        self.entries().find(|e| e[0] == key_id).map(|e| e[3])
    }

    /// Resolves a `GeoDouble`-valued key: such keys always carry `tiff_tag_location ==
    /// GeoDoubleParamsTag`, with `value_or_offset` an index into the separately fetched doubles
    /// array rather than an inline value.
    fn find_double(&self, key_id: u16) -> Option<f64> {
        let entry = self.entries().find(|e| e[0] == key_id)?;
        if entry[1] != GEO_DOUBLE_PARAMS_TAG {
            return None;
        }
        self.doubles.get(entry[3] as usize).copied()
    }

    pub fn model_type(&self) -> Option<ModelType> {
        self.find(1024).and_then(ModelType::from_code)
    }

    pub fn geographic_epsg(&self) -> Option<u32> {
        self.find(2048).filter(|&c| c != 0 && c != 32767).map(u32::from)
    }

    pub fn projected_epsg(&self) -> Option<u32> {
        self.find(3072).filter(|&c| c != 0 && c != 32767).map(u32::from)
    }

    pub fn proj_method(&self) -> Option<ProjMethod> {
        self.find(3075).and_then(ProjMethod::from_code)
    }

    pub fn angular_unit(&self) -> Option<AngularUnit> {
        self.find(2054).and_then(AngularUnit::from_epsg_unit_code)
    }

    pub fn linear_unit(&self) -> Option<LinearUnit> {
        self.find(3076).or_else(|| self.find(2052)).and_then(LinearUnit::from_epsg_unit_code)
    }

    // ProjectedCSTypeGeoKey parameters (GeoKey ids per OGC GeoTIFF Annex B).
    pub fn lat_std_1(&self) -> Option<f64> {
        self.find_double(3078)
    }
    pub fn lat_std_2(&self) -> Option<f64> {
        self.find_double(3079)
    }
    pub fn lon_natural_origin(&self) -> Option<f64> {
        self.find_double(3080)
    }
    pub fn lat_natural_origin(&self) -> Option<f64> {
        self.find_double(3081)
    }
    pub fn false_easting(&self) -> Option<f64> {
        self.find_double(3082)
    }
    pub fn false_northing(&self) -> Option<f64> {
        self.find_double(3083)
    }
    pub fn lon_false_origin(&self) -> Option<f64> {
        self.find_double(3084)
    }
    pub fn lat_false_origin(&self) -> Option<f64> {
        self.find_double(3085)
    }
    pub fn lon_center(&self) -> Option<f64> {
        self.find_double(3088)
    }
    pub fn lat_center(&self) -> Option<f64> {
        self.find_double(3089)
    }
    pub fn center_easting(&self) -> Option<f64> {
        self.find_double(3090)
    }
    pub fn center_northing(&self) -> Option<f64> {
        self.find_double(3091)
    }
    pub fn scale_at_natural_origin(&self) -> Option<f64> {
        self.find_double(3092)
    }
    pub fn scale_at_center(&self) -> Option<f64> {
        self.find_double(3093)
    }
    pub fn azimuth(&self) -> Option<f64> {
        self.find_double(3094)
    }

    // GeogCSTypeGeoKey ellipsoid parameters.
    pub fn semi_major_axis(&self) -> Option<f64> {
        self.find_double(2057)
    }
    pub fn semi_minor_axis(&self) -> Option<f64> {
        self.find_double(2058)
    }
    pub fn inv_flattening(&self) -> Option<f64> {
        self.find_double(2059)
    }
}

/// Rejects a user-defined ellipsoid that gives a semi-major axis without enough information to
/// derive its flattening: either `inverse_flattening` or `semi_minor_axis` must accompany it.
fn validate_ellipsoid(dir: &GeoKeyDirectory) -> Result<()> {
    if let Some(semi_major_axis) = dir.semi_major_axis() {
        if dir.semi_minor_axis().is_none() && dir.inv_flattening().is_none() {
            return Err(AffineError::InvalidEllipsoid {
                reason: format!(
                    "semi_major_axis {semi_major_axis} given without an accompanying semi_minor_axis or inverse_flattening"
                ),
            });
        }
    }
    Ok(())
}

fn base_crs(dir: &GeoKeyDirectory) -> BaseCrs {
    BaseCrs {
        geographic_epsg: dir.geographic_epsg(),
        semi_major_axis: dir.semi_major_axis(),
        semi_minor_axis: dir.semi_minor_axis(),
        inverse_flattening: dir.inv_flattening(),
    }
}

/// Parses a `GeoKeyDirectory`, preferring a plain EPSG code and falling back to a PROJJSON
/// description built from the recognised `ProjMethod`.
///
/// Returns `UnsupportedCrs` only when the directory names a projected CRS (no EPSG code) whose
/// `ProjCoordTransGeoKey` is not one of the methods in [`ProjMethod`]. Returns `InvalidEllipsoid`
/// when a user-defined ellipsoid's `semi_major_axis` has no `semi_minor_axis` or
/// `inverse_flattening` to pair with it.
pub fn parse_geo_keys(dir: &GeoKeyDirectory) -> Result<Crs> {
    validate_ellipsoid(dir)?;

    if let Some(epsg) = dir.projected_epsg() {
        return Ok(Crs::Epsg(epsg));
    }
    if let Some(epsg) = dir.geographic_epsg() {
        return Ok(Crs::Epsg(epsg));
    }

    let linear_unit = dir.linear_unit().map(|u| u.as_unit());
    let angular_unit = dir.angular_unit().map(|u| u.as_unit());

    match dir.model_type() {
        Some(ModelType::Projected) => {
            let method = dir.proj_method().ok_or(AffineError::UnsupportedCrs { proj_method: 0 })?;
            Ok(Crs::Projjson(ProjJsonCrs {
                crs_type: "ProjectedCRS",
                name: method.name().to_string(),
                base_crs: Some(base_crs(dir)),
                conversion: Some(Conversion { method: method.name().to_string(), parameters: method.parameters(dir) }),
                linear_unit,
                angular_unit,
            }))
        }
        Some(ModelType::Geographic) => Ok(Crs::Projjson(ProjJsonCrs {
            crs_type: "GeographicCRS",
            name: "unknown geographic CRS".to_string(),
            base_crs: Some(base_crs(dir)),
            conversion: None,
            linear_unit,
            angular_unit,
        })),
        Some(ModelType::Geocentric) => Err(AffineError::UnsupportedCrs { proj_method: 0 }),
        None => Err(AffineError::UnsupportedCrs { proj_method: 0 }),
    }
}
