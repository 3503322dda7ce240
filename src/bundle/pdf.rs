//! 最小的多页 PDF 写出：每页一张 JPEG（DCTDecode），页面尺寸按 100 DPI 换算。

use std::io::Write;

pub const PAGE_DPI: f64 = 100.0;
const POINTS_PER_INCH: f64 = 72.0;

#[derive(Debug, Clone)]
pub struct PageImage {
    pub width: u32,
    pub height: u32,
    pub jpeg: Vec<u8>,
}

impl PageImage {
    fn points(px: u32) -> String {
        format!("{:.2}", f64::from(px) * POINTS_PER_INCH / PAGE_DPI)
    }
}

struct ObjectWriter {
    buf: Vec<u8>,
    offsets: Vec<usize>,
}

impl ObjectWriter {
    fn new(object_count: usize) -> Self {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");
        Self {
            buf,
            offsets: vec![0; object_count],
        }
    }

    fn object(&mut self, id: usize, body: &[u8]) {
        self.offsets[id - 1] = self.buf.len();
        let _ = write!(self.buf, "{id} 0 obj\n");
        self.buf.extend_from_slice(body);
        self.buf.extend_from_slice(b"\nendobj\n");
    }

    fn stream(&mut self, id: usize, dict: &str, data: &[u8]) {
        let mut body = Vec::with_capacity(data.len() + dict.len() + 32);
        let _ = write!(body, "<< {dict} /Length {} >>\nstream\n", data.len());
        body.extend_from_slice(data);
        body.extend_from_slice(b"\nendstream");
        self.object(id, &body);
    }

    fn finish(mut self) -> Vec<u8> {
        let xref_at = self.buf.len();
        let size = self.offsets.len() + 1;
        let _ = write!(self.buf, "xref\n0 {size}\n0000000000 65535 f \n");
        for offset in &self.offsets {
            let _ = write!(self.buf, "{offset:010} 00000 n \n");
        }
        let _ = write!(
            self.buf,
            "trailer\n<< /Size {size} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n"
        );
        self.buf
    }
}

/// 对象编号：1 目录，2 页树，之后每页占 3 个（页面、内容流、图片）。
pub fn compose(pages: &[PageImage]) -> Vec<u8> {
    let page_id = |i: usize| 3 + i * 3;
    let mut w = ObjectWriter::new(2 + pages.len() * 3);

    w.object(1, b"<< /Type /Catalog /Pages 2 0 R >>");

    let kids = (0..pages.len())
        .map(|i| format!("{} 0 R", page_id(i)))
        .collect::<Vec<_>>()
        .join(" ");
    w.object(
        2,
        format!("<< /Type /Pages /Kids [{kids}] /Count {} >>", pages.len()).as_bytes(),
    );

    for (i, page) in pages.iter().enumerate() {
        let (pid, cid, iid) = (page_id(i), page_id(i) + 1, page_id(i) + 2);
        let (pw, ph) = (PageImage::points(page.width), PageImage::points(page.height));

        w.object(
            pid,
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {pw} {ph}] \
                 /Resources << /XObject << /Im0 {iid} 0 R >> >> /Contents {cid} 0 R >>"
            )
            .as_bytes(),
        );
        let content = format!("q {pw} 0 0 {ph} 0 0 cm /Im0 Do Q");
        w.stream(cid, "", content.as_bytes());
        w.stream(
            iid,
            &format!(
                "/Type /XObject /Subtype /Image /Width {} /Height {} \
                 /ColorSpace /DeviceRGB /BitsPerComponent 8 /Filter /DCTDecode",
                page.width, page.height
            ),
            &page.jpeg,
        );
    }

    w.finish()
}
