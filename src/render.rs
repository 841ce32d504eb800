use std::path::{
    Path,
    PathBuf,
};

use ab_glyph::{
    FontArc,
    FontVec,
    PxScale,
};
use chrono::{
    Local,
    NaiveDate,
};
use image::{
    imageops::{
        self,
        FilterType,
    },
    Rgb,
    RgbImage,
};
use imageproc::drawing::draw_text_mut;
use log::{
    info,
    warn,
};
use qrcode::{
    Color,
    EcLevel,
    QrCode,
};

use crate::{
    error::RenderError,
    model::Job,
};

/// A finished label, ready for the sink.
pub type Bitmap = RgbImage;

pub const LABEL_WIDTH: u32 = 800;
pub const LABEL_HEIGHT: u32 = 240;
pub const QR_SIZE: u32 = 132;
pub const QR_X: u32 = 220;
pub const QR_Y: u32 = (LABEL_HEIGHT - QR_SIZE) / 2;
pub const TEXT_X: u32 = QR_X + QR_SIZE + 30;
pub const LINE_HEIGHT: u32 = 55;
pub const FONT_SIZE: f32 = 24.0;

const QR_MODULE_PX: u32 = 10;
const QR_BORDER: u32 = 2;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

const FIELD_LABELS: [&str; 4] = ["이름", "사번", "소속", "발급"];

/// Font files tried in order when none are configured.
pub const DEFAULT_FONTS: &[&str] = &[
    "C:\\Windows\\Fonts\\malgun.ttf",
    "C:\\Windows\\Fonts\\gulim.ttc",
    "C:\\Windows\\Fonts\\batang.ttc",
    "C:\\Windows\\Fonts\\arial.ttf",
    "/usr/share/fonts/truetype/nanum/NanumGothic.ttf",
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
];

/// Turns a job into pixels. Must never touch the printer.
pub trait Renderer: Send + Sync {
    fn render(&self, job: &Job) -> Result<Bitmap, RenderError>;
}

/// The fixed QR-plus-four-lines badge layout.
#[derive(Clone)]
pub struct LabelRenderer {
    font: Option<FontArc>,
}

impl std::fmt::Debug for LabelRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabelRenderer")
            .field("font", &self.font.is_some())
            .finish()
    }
}

impl LabelRenderer {
    pub fn new(font: Option<FontArc>) -> Self {
        Self { font }
    }

    /// Use the first candidate that loads. With none, labels are printed
    /// without text.
    pub fn with_font_candidates(candidates: &[PathBuf]) -> Self {
        for path in candidates {
            if !path.exists() {
                continue;
            }
            match load_font(path) {
                Ok(font) => {
                    info!("Using font {}", path.display());
                    return Self::new(Some(font));
                }
                Err(e) => warn!("Skipping font; error = {}", e),
            }
        }

        warn!("No usable font found, labels will carry the QR symbol only");
        Self::new(None)
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// The four text lines for `job`, with a missing issue date replaced by
    /// `today`.
    pub fn text_lines(job: &Job, today: NaiveDate) -> [String; 4] {
        let issued = job
            .issue_date
            .clone()
            .unwrap_or_else(|| today.format("%Y-%m-%d").to_string());
        let values = [job.name.as_str(), job.employee_id.as_str(), job.department.as_str(), issued.as_str()];

        let mut lines: [String; 4] = Default::default();
        for (line, (label, value)) in lines.iter_mut().zip(FIELD_LABELS.iter().zip(values)) {
            *line = format!("{}: {}", label, value);
        }
        lines
    }

    pub fn render_on(&self, job: &Job, today: NaiveDate) -> Result<Bitmap, RenderError> {
        let mut label = RgbImage::from_pixel(LABEL_WIDTH, LABEL_HEIGHT, WHITE);

        let qr = qr_symbol(&job.qr_payload, QR_SIZE)?;
        imageops::replace(&mut label, &qr, QR_X as i64, QR_Y as i64);

        if let Some(font) = &self.font {
            let lines = Self::text_lines(job, today);
            let total = lines.len() as u32 * LINE_HEIGHT - LINE_HEIGHT / 2;
            let mut y = (LABEL_HEIGHT - total) / 2;
            for line in &lines {
                draw_text_mut(&mut label, BLACK, TEXT_X as i32, y as i32, PxScale::from(FONT_SIZE), font, line);
                y += LINE_HEIGHT;
            }
        }

        Ok(label)
    }
}

impl Renderer for LabelRenderer {
    fn render(&self, job: &Job) -> Result<Bitmap, RenderError> {
        self.render_on(job, Local::now().date_naive())
    }
}

fn load_font(path: &Path) -> Result<FontArc, RenderError> {
    let font_err = |reason: String| RenderError::Font {
        path: path.display().to_string(),
        reason,
    };

    let data = std::fs::read(path).map_err(|e| font_err(e.to_string()))?;
    let font = FontVec::try_from_vec_and_index(data, 0).map_err(|e| font_err(e.to_string()))?;

    Ok(FontArc::new(font))
}

/// Low error correction, smallest version that fits, scaled to `size`.
fn qr_symbol(data: &str, size: u32) -> Result<RgbImage, RenderError> {
    let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::L)
        .map_err(|e| RenderError::Qr(e.to_string()))?;

    let modules = code.width() as u32;
    let side = (modules + 2 * QR_BORDER) * QR_MODULE_PX;
    let raw = RgbImage::from_fn(side, side, |x, y| {
        let mx = (x / QR_MODULE_PX) as i64 - QR_BORDER as i64;
        let my = (y / QR_MODULE_PX) as i64 - QR_BORDER as i64;
        let inside = (0..modules as i64).contains(&mx) && (0..modules as i64).contains(&my);
        if inside && code[(mx as usize, my as usize)] == Color::Dark {
            BLACK
        } else {
            WHITE
        }
    });

    Ok(imageops::resize(&raw, size, size, FilterType::Lanczos3))
}
