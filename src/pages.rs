//! Server-rendered HTML. Templates are compiled into the binary and re-read
//! from `templates/` on every request in dev mode. Substitution is plain
//! `{{name}}` replacement; every user-supplied value goes through `escape`.

use crate::{
    errors::AppError,
    models::PendingPhoto,
};
use std::fmt::Write;

const BASE: &str = include_str!("../templates/base.html");
const INDEX: &str = include_str!("../templates/index.html");
const UPLOAD: &str = include_str!("../templates/upload.html");
const ADMIN: &str = include_str!("../templates/admin.html");

pub const STYLE_CSS: &str = include_str!("../static/style.css");

pub const ROBOTS_TXT: &str = "# robots welcome\n";

#[derive(Debug, Clone, Copy)]
pub struct Templates {
    pub dev_mode: bool,
}

impl Templates {
    async fn load(&self, name: &str, embedded: &'static str) -> Result<String, AppError> {
        if !self.dev_mode {
            return Ok(embedded.to_string());
        }
        let path = format!("templates/{}", name);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| AppError::InternalServerError(format!("Failed to read template {}: {}", path, e)))
    }

    async fn page(&self, title: &str, name: &str, embedded: &'static str, vars: &[(&str, &str)]) -> Result<String, AppError> {
        let content = fill(&self.load(name, embedded).await?, vars);
        let base = self.load("base.html", BASE).await?;
        Ok(fill(&base, &[("title", escape(title).as_str()), ("content", content.as_str())]))
    }

    /// Gallery of published images.
    pub async fn index(&self, names: &[String]) -> Result<String, AppError> {
        let mut items = String::new();
        for name in names {
            let name = escape(name);
            let _ = writeln!(
                items,
                r#"  <li><a href="/images/{name}"><img src="/images/{name}" alt="bicycle photo" loading="lazy"></a></li>"#
            );
        }
        let count = names.len().to_string();
        self.page("Gallery", "index.html", INDEX, &[("count", count.as_str()), ("items", items.as_str())])
            .await
    }

    pub async fn upload(&self) -> Result<String, AppError> {
        self.page("Submit a photo", "upload.html", UPLOAD, &[]).await
    }

    /// Moderation queue: each pending photo with its metadata, the gallery
    /// entry it will become, and approve / reject buttons.
    pub async fn admin(&self, pending: &[PendingPhoto], limit: usize) -> Result<String, AppError> {
        let mut items = String::new();
        for PendingPhoto { key, photo } in pending {
            let image = escape(&photo.image_reference);
            let entry = serde_json::to_string_pretty(&photo.gallery_entry())
                .map_err(|e| AppError::InternalServerError(format!("Failed to encode gallery entry for {}: {}", key, e)))?;
            let submitted = photo
                .submitted_at
                .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string())
                .unwrap_or_default();
            let _ = write!(
                items,
                concat!(
                    "<section class=\"pending\">\n",
                    "  <a href=\"/_admin/images/{image}\"><img src=\"/_admin/images/{image}\" alt=\"pending photo\"></a>\n",
                    "  <div>\n",
                    "    <p><strong>{copyright}</strong> {bike}</p>\n",
                    "    <p>Colors: {colors}</p>\n",
                    "    <p>Source: {src}</p>\n",
                    "    <p>Submitted: {submitted}</p>\n",
                    "    <pre>{entry}</pre>\n",
                    "    <form method=\"post\" action=\"/_admin/\">\n",
                    "      <input type=\"hidden\" name=\"image_file\" value=\"{image}\">\n",
                    "      <button name=\"action\" value=\"approve\">Approve</button>\n",
                    "      <button name=\"action\" value=\"reject\">Reject</button>\n",
                    "    </form>\n",
                    "  </div>\n",
                    "</section>\n",
                ),
                image = image,
                copyright = escape(&photo.copyright),
                bike = escape(&photo.bike_model),
                colors = escape(&photo.color_tokens().join(", ")),
                src = escape(&photo.source_url),
                submitted = submitted,
                entry = escape(&entry),
            );
        }
        let count = pending.len().to_string();
        let limit = limit.to_string();
        self.page(
            "Moderation",
            "admin.html",
            ADMIN,
            &[("count", count.as_str()), ("limit", limit.as_str()), ("items", items.as_str())],
        )
        .await
    }
}

fn fill(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |out, (name, value)| {
        out.replace(&format!("{{{{{}}}}}", name), value)
    })
}

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Photo;

    const EMBEDDED: Templates = Templates { dev_mode: false };

    #[test]
    fn escape_neutralises_markup() {
        assert_eq!(escape(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn fill_replaces_every_occurrence() {
        assert_eq!(fill("{{a}}-{{b}}-{{a}}", &[("a", "1"), ("b", "2")]), "1-2-1");
    }

    #[tokio::test]
    async fn index_links_published_images() {
        let html = EMBEDDED.index(&["a.jpg".to_string()]).await.unwrap();
        assert!(html.contains(r#"src="/images/a.jpg""#));
        assert!(html.contains("<title>Gallery | Cycle Colors</title>"));
        assert!(!html.contains("{{"));
    }

    #[tokio::test]
    async fn upload_form_posts_multipart() {
        let html = EMBEDDED.upload().await.unwrap();
        assert!(html.contains(r#"enctype="multipart/form-data""#));
        assert!(html.contains(r#"name="img""#));
    }

    #[tokio::test]
    async fn admin_escapes_submitted_text() {
        let pending = PendingPhoto {
            key: "uploaded/abc.json".into(),
            photo: Photo {
                copyright: "<script>alert(1)</script>".into(),
                colors: "red".into(),
                image_reference: "abc.jpg".into(),
                ..Default::default()
            },
        };
        let html = EMBEDDED.admin(&[pending], 50).await.unwrap();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains(r#"value="abc.jpg""#));
        assert!(html.contains("images/abc.jpg"));
    }
}
