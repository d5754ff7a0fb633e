use printpdf::image_crate::{self, GenericImageView};
use printpdf::{
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Line, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference, Point,
};
use shared::{ClassificationResult, DoctorDetails, PatientDetails, TumorInfo, VisitType};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::catalog::TumorCatalog;
use crate::config::ReportConfig;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 10.0;
const BOTTOM_MARGIN: f32 = 15.0;
const IMAGE_WIDTH: f32 = 170.0;
const SIGNATURE_WIDTH: f32 = 50.0;
const IMAGE_DPI: f32 = 300.0;
const PT_TO_MM: f32 = 0.3528;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("No tumor info for label '{0}'")]
    UnknownLabel(String),
    #[error("PDF error: {0}")]
    Pdf(String),
    #[error("Failed to load image {path}: {reason}")]
    Image { path: PathBuf, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Inputs for a single report.
pub struct ReportRequest<'a> {
    pub result: &'a ClassificationResult,
    pub patient: &'a PatientDetails,
    pub visit: &'a VisitType,
    pub image_path: &'a Path,
    pub timestamp: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignatureBlock {
    /// Blank line for a handwritten signature, captioned with the doctor's name.
    Manual { doctor_name: String },
    /// Embedded signature image.
    Digital { asset: PathBuf },
    NotAvailable,
}

/// Everything that ends up on the page, resolved before any drawing.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportLayout {
    pub title: String,
    pub doctor: DoctorDetails,
    pub patient: PatientDetails,
    pub scan_date: String,
    pub tumor_type: String,
    pub confidence: String,
    pub info: TumorInfo,
    pub signature: SignatureBlock,
    pub disclaimer: String,
    pub image_page: Option<PathBuf>,
}

/// `Medical_Report_<name>.pdf`, with the patient name reduced to `[A-Za-z0-9_-]`.
pub fn report_file_name(patient_name: &str) -> String {
    let safe_name: String = patient_name
        .trim()
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
        .collect();
    let safe_name = if safe_name.is_empty() {
        "Patient".to_string()
    } else {
        safe_name
    };
    format!("Medical_Report_{}.pdf", safe_name)
}

#[derive(Clone)]
pub struct ReportGenerator {
    output_dir: PathBuf,
    signature_path: PathBuf,
    catalog: Arc<TumorCatalog>,
    config: ReportConfig,
}

impl ReportGenerator {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        signature_path: impl Into<PathBuf>,
        catalog: Arc<TumorCatalog>,
        config: ReportConfig,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            signature_path: signature_path.into(),
            catalog,
            config,
        }
    }

    pub fn doctor_for(&self, visit: &VisitType) -> DoctorDetails {
        match visit {
            VisitType::DoctorVisit { name, phone } => DoctorDetails {
                name: name.clone(),
                phone: phone.clone(),
            },
            VisitType::PatientVisit => DoctorDetails {
                name: self.config.ai_doctor_name.clone(),
                phone: self.config.ai_doctor_phone.clone(),
            },
        }
    }

    pub fn compose(&self, request: &ReportRequest<'_>) -> Result<ReportLayout, ReportError> {
        let info = self
            .catalog
            .get(&request.result.label)
            .cloned()
            .ok_or_else(|| ReportError::UnknownLabel(request.result.label.clone()))?;

        let doctor = self.doctor_for(request.visit);
        let signature = match request.visit {
            VisitType::DoctorVisit { name, .. } => SignatureBlock::Manual {
                doctor_name: name.clone(),
            },
            VisitType::PatientVisit if self.signature_path.is_file() => SignatureBlock::Digital {
                asset: self.signature_path.clone(),
            },
            VisitType::PatientVisit => SignatureBlock::NotAvailable,
        };

        let image_page = request
            .image_path
            .is_file()
            .then(|| request.image_path.to_path_buf());

        Ok(ReportLayout {
            title: self.config.title.clone(),
            doctor,
            patient: request.patient.clone(),
            scan_date: request.timestamp.to_string(),
            tumor_type: request.result.label.to_uppercase(),
            confidence: request.result.confidence_percent(),
            info,
            signature,
            disclaimer: self.config.disclaimer.clone(),
            image_page,
        })
    }

    /// Writes the report PDF and returns its path. A previous report for a
    /// patient with the same sanitized name is overwritten.
    pub fn render(&self, request: &ReportRequest<'_>) -> Result<PathBuf, ReportError> {
        let layout = self.compose(request)?;
        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(report_file_name(&request.patient.name));

        let doc = draw(&layout)?;
        let mut writer = BufWriter::new(File::create(&path)?);
        doc.save(&mut writer)
            .map_err(|e| ReportError::Pdf(e.to_string()))?;

        log::info!("Report written to {}", path.display());
        Ok(path)
    }
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    italic: IndirectFontRef,
}

/// Top-down text cursor over the current page.
struct PageWriter<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    fonts: Fonts,
    y: f32,
}

impl<'a> PageWriter<'a> {
    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = PAGE_HEIGHT - MARGIN;
    }

    fn ensure_space(&mut self, height: f32) {
        if self.y - height < BOTTOM_MARGIN {
            self.new_page();
        }
    }

    fn text(&mut self, text: &str, size: f32, font: FontFace, align: Align, height: f32) {
        self.ensure_space(height);
        let baseline = self.y - height * 0.7;
        let x = match align {
            Align::Left => MARGIN,
            Align::Center => ((PAGE_WIDTH - text_width(text, size)) / 2.0).max(MARGIN),
            Align::Right => (PAGE_WIDTH - MARGIN - text_width(text, size)).max(MARGIN),
        };
        let font = match font {
            FontFace::Regular => &self.fonts.regular,
            FontFace::Bold => &self.fonts.bold,
            FontFace::Italic => &self.fonts.italic,
        };
        self.layer.use_text(text, size, Mm(x), Mm(baseline), font);
        self.y -= height;
    }

    fn wrapped(&mut self, text: &str, size: f32, font: FontFace, height: f32) {
        let max_chars = ((PAGE_WIDTH - 2.0 * MARGIN) / (size * 0.5 * PT_TO_MM)) as usize;
        for line in wrap(text, max_chars) {
            self.text(&line, size, font, Align::Left, height);
        }
    }

    fn gap(&mut self, height: f32) {
        self.y -= height;
    }

    fn rule(&mut self) {
        let line = Line {
            points: vec![
                (Point::new(Mm(MARGIN), Mm(self.y)), false),
                (Point::new(Mm(PAGE_WIDTH - MARGIN), Mm(self.y)), false),
            ],
            is_closed: false,
        };
        self.layer.add_line(line);
    }

    /// Places `image` with its top-left at (`x`, cursor), `width` mm wide,
    /// shrinking it to fit the remaining page height.
    fn image(&mut self, image: image_crate::DynamicImage, x: f32, width: f32) {
        let (px_w, px_h) = (image.width() as f32, image.height() as f32);
        let natural_w = px_w / IMAGE_DPI * 25.4;
        let natural_h = px_h / IMAGE_DPI * 25.4;
        let available_h = self.y - BOTTOM_MARGIN;
        let scale = (width / natural_w).min(available_h / natural_h);
        let height = natural_h * scale;

        Image::from_dynamic_image(&image).add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(x)),
                translate_y: Some(Mm(self.y - height)),
                scale_x: Some(scale),
                scale_y: Some(scale),
                dpi: Some(IMAGE_DPI),
                ..Default::default()
            },
        );
        self.y -= height;
    }
}

/// Decodes an image for embedding. Transparent pixels are composited over
/// white so signature assets don't render as black boxes.
fn load_image(path: &Path) -> Result<image_crate::DynamicImage, ReportError> {
    let image_error = |reason: String| ReportError::Image {
        path: path.to_path_buf(),
        reason,
    };
    let rgba = image_crate::open(path)
        .map_err(|e| image_error(e.to_string()))?
        .to_rgba8();
    if rgba.width() == 0 || rgba.height() == 0 {
        return Err(image_error("image has no pixels".to_string()));
    }

    let mut buffer = image_crate::RgbImage::new(rgba.width(), rgba.height());
    for (src, dst) in rgba.pixels().zip(buffer.pixels_mut()) {
        let [r, g, b, a] = src.0;
        *dst = image_crate::Rgb([over_white(r, a), over_white(g, a), over_white(b, a)]);
    }
    Ok(image_crate::DynamicImage::ImageRgb8(buffer))
}

fn over_white(channel: u8, alpha: u8) -> u8 {
    let (c, a) = (channel as u32, alpha as u32);
    ((c * a + 255 * (255 - a) + 127) / 255) as u8
}

#[derive(Clone, Copy)]
enum FontFace {
    Regular,
    Bold,
    Italic,
}

#[derive(Clone, Copy)]
enum Align {
    Left,
    Center,
    Right,
}

fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * 0.5 * PT_TO_MM
}

fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

fn draw(layout: &ReportLayout) -> Result<PdfDocumentReference, ReportError> {
    let (doc, page, layer) =
        PdfDocument::new(&layout.title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let font = |face| doc.add_builtin_font(face).map_err(|e| ReportError::Pdf(e.to_string()));
    let fonts = Fonts {
        regular: font(BuiltinFont::Helvetica)?,
        bold: font(BuiltinFont::HelveticaBold)?,
        italic: font(BuiltinFont::HelveticaOblique)?,
    };

    let mut writer = PageWriter {
        doc: &doc,
        layer: doc.get_page(page).get_layer(layer),
        fonts,
        y: PAGE_HEIGHT - MARGIN,
    };

    writer.text(&layout.title, 14.0, FontFace::Bold, Align::Center, 10.0);
    writer.text(&format!("Doctor: {}", layout.doctor.name), 12.0, FontFace::Regular, Align::Left, 8.0);
    writer.text(&format!("Contact: {}", layout.doctor.phone), 12.0, FontFace::Regular, Align::Left, 8.0);
    writer.gap(3.0);
    writer.rule();
    writer.gap(5.0);

    writer.text("Patient Details", 13.0, FontFace::Bold, Align::Left, 10.0);
    writer.text(&format!("Name: {}", layout.patient.name), 12.0, FontFace::Regular, Align::Left, 8.0);
    writer.text(&format!("Age: {}", layout.patient.age), 12.0, FontFace::Regular, Align::Left, 8.0);
    writer.wrapped(&format!("Address: {}", layout.patient.address), 12.0, FontFace::Regular, 8.0);
    writer.text(&format!("Scan Date: {}", layout.scan_date), 12.0, FontFace::Regular, Align::Left, 8.0);
    writer.gap(5.0);

    writer.text("MRI Analysis Result", 13.0, FontFace::Bold, Align::Left, 10.0);
    writer.text(&format!("Tumor Type: {}", layout.tumor_type), 12.0, FontFace::Regular, Align::Left, 8.0);
    writer.text(&format!("Confidence: {}", layout.confidence), 12.0, FontFace::Regular, Align::Left, 8.0);
    writer.text(&format!("Risk Level: {}", layout.info.risk_level), 12.0, FontFace::Regular, Align::Left, 8.0);
    writer.wrapped(&format!("Description: {}", layout.info.description), 12.0, FontFace::Regular, 8.0);
    writer.wrapped(&format!("Symptoms: {}", layout.info.symptoms), 12.0, FontFace::Regular, 8.0);

    writer.gap(15.0);
    match &layout.signature {
        SignatureBlock::Manual { doctor_name } => {
            writer.text("Doctor Signature: ____________________", 12.0, FontFace::Bold, Align::Right, 10.0);
            writer.text(&format!("({})", doctor_name), 10.0, FontFace::Italic, Align::Right, 8.0);
        }
        SignatureBlock::Digital { asset } => match load_image(asset) {
            Ok(signature) => {
                writer.ensure_space(33.0);
                writer.image(signature, PAGE_WIDTH - MARGIN - SIGNATURE_WIDTH, SIGNATURE_WIDTH);
                writer.text("(Digital Signature)", 10.0, FontFace::Italic, Align::Right, 8.0);
            }
            Err(e) => {
                log::warn!("Signature asset unusable, falling back to placeholder: {}", e);
                writer.text("Doctor Signature: [Not Available]", 12.0, FontFace::Regular, Align::Right, 10.0);
            }
        },
        SignatureBlock::NotAvailable => {
            writer.text("Doctor Signature: [Not Available]", 12.0, FontFace::Regular, Align::Right, 10.0);
        }
    }

    writer.gap(3.0);
    writer.wrapped(&layout.disclaimer, 9.0, FontFace::Italic, 8.0);

    // The scan may have gone missing since compose(); the page is omitted then.
    if let Some(image_path) = &layout.image_page {
        match load_image(image_path) {
            Ok(scan) => {
                writer.new_page();
                writer.image(scan, (PAGE_WIDTH - IMAGE_WIDTH) / 2.0, IMAGE_WIDTH);
            }
            Err(e) => log::warn!("Skipping scan page in report: {}", e),
        }
    }

    drop(writer);
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn generator(dir: &TempDir, signature: Option<&Path>) -> ReportGenerator {
        let signature_path = signature
            .map(Path::to_path_buf)
            .unwrap_or_else(|| dir.path().join("signatures/missing.png"));
        ReportGenerator::new(
            dir.path().join("reports"),
            signature_path,
            Arc::new(TumorCatalog::default()),
            ReportConfig::default(),
        )
    }

    fn patient() -> PatientDetails {
        PatientDetails {
            name: "Jane Roe".into(),
            age: "41".into(),
            address: "12 Elm Street, Springfield".into(),
        }
    }

    fn write_png(path: &Path, w: u32, h: u32) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        image::RgbImage::from_pixel(w, h, image::Rgb([200, 10, 10]))
            .save(path)
            .unwrap();
    }

    fn doctor_visit() -> VisitType {
        VisitType::DoctorVisit {
            name: "Dr. House".into(),
            phone: "555-0100".into(),
        }
    }

    #[test]
    fn test_report_file_name() {
        assert_eq!(report_file_name("Jane Roe"), "Medical_Report_Jane_Roe.pdf");
        assert_eq!(report_file_name("  "), "Medical_Report_Patient.pdf");
        assert_eq!(report_file_name("../evil/name"), "Medical_Report_evilname.pdf");
    }

    #[test]
    fn test_compose_doctor_visit_never_uses_digital_signature() {
        let dir = TempDir::new().unwrap();
        let asset = dir.path().join("signatures/digital_sign.png");
        write_png(&asset, 20, 10);
        let generator = generator(&dir, Some(&asset));

        let result = ClassificationResult::new("glioma", 0.912);
        let visit = doctor_visit();
        let layout = generator
            .compose(&ReportRequest {
                result: &result,
                patient: &patient(),
                visit: &visit,
                image_path: Path::new("/nonexistent/scan.png"),
                timestamp: "01-02-2026 10:00:00",
            })
            .unwrap();

        assert_eq!(
            layout.signature,
            SignatureBlock::Manual {
                doctor_name: "Dr. House".into()
            }
        );
        assert_eq!(layout.doctor.phone, "555-0100");
        assert_eq!(layout.tumor_type, "GLIOMA");
        assert_eq!(layout.confidence, "91.20%");
        assert_eq!(layout.info.risk_level, "High Risk");
        assert!(layout.image_page.is_none());
    }

    #[test]
    fn test_compose_patient_visit_with_asset() {
        let dir = TempDir::new().unwrap();
        let asset = dir.path().join("signatures/digital_sign.png");
        write_png(&asset, 20, 10);
        let generator = generator(&dir, Some(&asset));

        let result = ClassificationResult::new("pituitary", 0.9);
        let layout = generator
            .compose(&ReportRequest {
                result: &result,
                patient: &patient(),
                visit: &VisitType::PatientVisit,
                image_path: Path::new("/nonexistent/scan.png"),
                timestamp: "01-02-2026 10:00:00",
            })
            .unwrap();

        assert_eq!(layout.signature, SignatureBlock::Digital { asset });
        assert_eq!(layout.doctor.name, "Brain Tumor Detection AI Model");
    }

    #[test]
    fn test_patient_visit_without_asset_renders_placeholder() {
        let dir = TempDir::new().unwrap();
        let generator = generator(&dir, None);
        let scan = dir.path().join("uploads/scan.png");
        write_png(&scan, 64, 48);

        let result = ClassificationResult::new("notumor", 0.99);
        let request = ReportRequest {
            result: &result,
            patient: &patient(),
            visit: &VisitType::PatientVisit,
            image_path: &scan,
            timestamp: "01-02-2026 10:00:00",
        };

        let layout = generator.compose(&request).unwrap();
        assert_eq!(layout.signature, SignatureBlock::NotAvailable);
        assert_eq!(layout.image_page, Some(scan.clone()));

        let path = generator.render(&request).unwrap();
        assert_eq!(path, dir.path().join("reports/Medical_Report_Jane_Roe.pdf"));
        let bytes = fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_render_with_digital_signature() {
        let dir = TempDir::new().unwrap();
        let asset = dir.path().join("signatures/digital_sign.png");
        write_png(&asset, 120, 40);
        let generator = generator(&dir, Some(&asset));

        let result = ClassificationResult::new("meningioma", 0.7);
        let path = generator
            .render(&ReportRequest {
                result: &result,
                patient: &patient(),
                visit: &VisitType::PatientVisit,
                image_path: Path::new("/nonexistent/scan.png"),
                timestamp: "01-02-2026 10:00:00",
            })
            .unwrap();
        assert!(fs::read(path).unwrap().starts_with(b"%PDF"));
    }

    #[test]
    fn test_unknown_label_fails_closed() {
        let dir = TempDir::new().unwrap();
        let generator = generator(&dir, None);

        let result = ClassificationResult::new("astrocytoma", 0.9);
        let visit = doctor_visit();
        let err = generator
            .render(&ReportRequest {
                result: &result,
                patient: &patient(),
                visit: &visit,
                image_path: Path::new("/nonexistent/scan.png"),
                timestamp: "01-02-2026 10:00:00",
            })
            .unwrap_err();

        assert!(matches!(err, ReportError::UnknownLabel(label) if label == "astrocytoma"));
        assert!(!dir.path().join("reports/Medical_Report_Jane_Roe.pdf").exists());
    }

    #[test]
    fn test_transparent_signature_flattens_to_white() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sign.png");
        let mut sign = image::RgbaImage::from_pixel(4, 4, image::Rgba([0, 0, 0, 0]));
        sign.put_pixel(1, 1, image::Rgba([0, 0, 0, 255]));
        sign.put_pixel(2, 2, image::Rgba([200, 0, 0, 128]));
        sign.save(&path).unwrap();

        let flat = load_image(&path).unwrap().to_rgb8();
        assert_eq!(flat.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(flat.get_pixel(1, 1).0, [0, 0, 0]);
        assert_eq!(flat.get_pixel(2, 2).0, [227, 127, 127]);
    }

    #[test]
    fn test_wrap_breaks_on_words() {
        let lines = wrap("one two three four", 9);
        assert_eq!(lines, vec!["one two", "three", "four"]);
        assert_eq!(wrap("", 10), vec![String::new()]);
    }
}
