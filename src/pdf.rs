// src/pdf.rs

use std::fmt;

use crate::models::certificate::CertificateData;

#[derive(Debug)]
pub struct RenderError(pub String);

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "certificate render error: {}", self.0)
    }
}

impl std::error::Error for RenderError {}

/// Renders a certificate into document bytes.
///
/// The real rendering engine is an external collaborator; this trait is
/// its boundary. The built-in implementation emits a minimal valid PDF so
/// the pipeline works end to end without one.
pub trait CertificateRenderer: Send + Sync {
    fn render(&self, certificate: &CertificateData) -> Result<Vec<u8>, RenderError>;

    fn content_type(&self) -> &'static str {
        "application/pdf"
    }
}

/// Single-page landscape A4 certificate, uncompressed PDF 1.4.
pub struct PdfCertificateRenderer;

impl PdfCertificateRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfCertificateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Escapes a string for a PDF literal string.
fn escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)")
}

/// One positioned text line in the content stream.
fn text_line(font: &str, size: u32, x: u32, y: u32, text: &str) -> String {
    format!("BT /{} {} Tf {} {} Td ({}) Tj ET\n", font, size, x, y, escape(text))
}

impl CertificateRenderer for PdfCertificateRenderer {
    fn render(&self, certificate: &CertificateData) -> Result<Vec<u8>, RenderError> {
        let mut content = String::new();
        content.push_str(&text_line("F2", 32, 140, 470, "Certificate of Completion"));
        content.push_str("120 450 m 722 450 l 2 w S\n");
        content.push_str(&text_line("F1", 16, 140, 400, "This certifies that"));
        content.push_str(&text_line("F2", 26, 140, 360, &certificate.student_name));
        content.push_str(&text_line("F1", 16, 140, 320, "has successfully completed"));
        content.push_str(&text_line("F2", 22, 140, 285, &certificate.course_name));
        content.push_str(&text_line(
            "F1",
            13,
            140,
            235,
            &format!("Final score: {}%", certificate.score),
        ));
        content.push_str(&text_line(
            "F1",
            13,
            140,
            212,
            &format!("Completed on {}", certificate.completion_date),
        ));
        content.push_str(&text_line(
            "F1",
            10,
            140,
            160,
            &format!("Certificate ID: {}", certificate.certificate_id),
        ));

        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 842 595] \
             /Resources << /Font << /F1 5 0 R /F2 6 0 R >> >> /Contents 4 0 R >>"
                .to_string(),
            format!(
                "<< /Length {} >>\nstream\n{}endstream",
                content.len(),
                content
            ),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold >>".to_string(),
        ];

        let mut buf: Vec<u8> = Vec::new();
        buf.extend_from_slice(b"%PDF-1.4\n");

        let mut offsets = Vec::with_capacity(objects.len());
        for (index, body) in objects.iter().enumerate() {
            offsets.push(buf.len());
            buf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", index + 1, body).as_bytes());
        }

        let xref_start = buf.len();
        buf.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
        buf.extend_from_slice(b"0000000000 65535 f \n");
        for offset in &offsets {
            buf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        buf.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                objects.len() + 1,
                xref_start
            )
            .as_bytes(),
        );

        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> CertificateData {
        CertificateData {
            student_name: "Ada Lovelace".to_string(),
            course_name: "Foundations (Part 1)".to_string(),
            completion_date: "August 7, 2026".to_string(),
            score: 95,
            certificate_id: "CERT-1-2-1".to_string(),
        }
    }

    #[test]
    fn renders_a_pdf_document() {
        let bytes = PdfCertificateRenderer::new().render(&data()).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.4"));
        assert!(bytes.ends_with(b"%%EOF\n"));

        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("Certificate of Completion"));
        assert!(text.contains("Ada Lovelace"));
        // Parens in the course name must be escaped inside the literal.
        assert!(text.contains("Foundations \\(Part 1\\)"));
    }
}
