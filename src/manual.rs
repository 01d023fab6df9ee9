use std::path::{Path, PathBuf};

use lopdf::{
    content::{Content, Operation},
    dictionary, Dictionary, Document, Object, ObjectId,
};
use uuid::Uuid;

use crate::domain::{Plan, User};

const FONT_KEY: &str = "FManual";
const FONT_SIZE: i64 = 14;
/// 叠加文字的位置，单位为pt，原点在页面左下角
const NAME_POSITION: (f32, f32) = (212.0, 417.0);
const TITLE_POSITION: (f32, f32) = (212.0, 397.0);

#[derive(thiserror::Error, Debug)]
pub enum ManualError {
    #[error("manual template has no pages.")]
    EmptyTemplate,
    #[error("failed to process pdf.")]
    Pdf(#[from] lopdf::Error),
    #[error("failed to write manual.")]
    Io(#[from] std::io::Error),
}

#[derive(serde::Deserialize, Clone)]
pub struct ManualSettings {
    pub template_path: String,
    /// 为空时使用系统临时目录
    pub output_dir: String,
}

impl ManualSettings {
    pub fn output_dir(&self) -> PathBuf {
        if self.output_dir.trim().is_empty() {
            std::env::temp_dir()
        } else {
            PathBuf::from(&self.output_dir)
        }
    }

    /// `{tmp}/{user_id}_manual.pdf`
    pub fn manual_path(&self, user_id: Uuid) -> PathBuf {
        self.output_dir().join(format!("{user_id}_manual.pdf"))
    }
}

/// 导入模板PDF第一页，在固定位置叠加购买者姓名和计划名，写入`output`
#[tracing::instrument(name = "generate manual", skip(user, plan), fields(user_id = %user.id, plan = %plan.plan_name))]
pub fn generate_manual(
    template: &Path,
    output: &Path,
    user: &User,
    plan: &Plan,
) -> Result<(), ManualError> {
    let mut doc = Document::load(template)?;
    let page_id = *doc
        .get_pages()
        .values()
        .next()
        .ok_or(ManualError::EmptyTemplate)?;

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let mut resources = effective_resources(&doc, page_id)?;
    let mut fonts = match resources.get(b"Font") {
        Ok(Object::Dictionary(fonts)) => fonts.clone(),
        Ok(Object::Reference(id)) => doc.get_dictionary(*id)?.clone(),
        _ => Dictionary::new(),
    };
    fonts.set(FONT_KEY, font_id);
    resources.set("Font", fonts);
    doc.get_object_mut(page_id)?
        .as_dict_mut()?
        .set("Resources", resources);

    let mut operations = text_at(NAME_POSITION, user.full_name());
    operations.extend(text_at(TITLE_POSITION, format!("{} User Guide", plan.plan_name)));
    let overlay = Content { operations };
    doc.add_page_contents(page_id, overlay.encode()?)?;

    if let Some(dir) = output.parent() {
        std::fs::create_dir_all(dir)?;
    }
    doc.save(output)?;
    tracing::info!(path = %output.display(), "manual written.");

    Ok(())
}

fn text_at((x, y): (f32, f32), text: String) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![FONT_KEY.into(), FONT_SIZE.into()]),
        Operation::new("Td", vec![x.into(), y.into()]),
        Operation::new("Tj", vec![Object::string_literal(text)]),
        Operation::new("ET", vec![]),
        Operation::new("Q", vec![]),
    ]
}

/// 页面自身或继承自父节点的资源字典
fn effective_resources(doc: &Document, page_id: ObjectId) -> Result<Dictionary, lopdf::Error> {
    let mut node = doc.get_dictionary(page_id)?;
    loop {
        match node.get(b"Resources") {
            Ok(Object::Dictionary(resources)) => return Ok(resources.clone()),
            Ok(Object::Reference(id)) => return Ok(doc.get_dictionary(*id)?.clone()),
            _ => {}
        }
        match node.get(b"Parent") {
            Ok(Object::Reference(parent)) => node = doc.get_dictionary(*parent)?,
            _ => return Ok(Dictionary::new()),
        }
    }
}
