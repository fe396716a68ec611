pub mod categories;
pub mod instances;
pub mod knowledge_files;
pub mod projects;
pub mod template_categories;
pub mod templates;
