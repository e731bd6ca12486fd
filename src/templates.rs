use std::sync::OnceLock;
use tera::Tera;

static TERA: OnceLock<Tera> = OnceLock::new();

pub fn get_tera() -> &'static Tera {
    TERA.get_or_init(|| {
        let mut tera = Tera::default();
        // `.html` names keep tera's auto-escaping on.
        tera.add_raw_templates(vec![
            ("index.html", include_str!("../templates/index.html")),
            ("verify.html", include_str!("../templates/verify.html")),
        ])
        .expect("Failed to load templates");
        tera
    })
}
