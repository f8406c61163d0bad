mod bitmap;
mod color;
mod compose;
mod export;
mod font;
mod geom;

pub use color::{parse_color, TextColor};
pub use compose::{is_xml_char, Placement, Scene};
pub use export::{export, OutputFormat};
pub use font::{FaceStyle, FontFace, FontHandle, FontMetrics, FontRegistry, FontResolver, FontSource};
pub use geom::{scale_field, Canvas, ScaledField, REFERENCE_DPI, REFERENCE_SIZE};
