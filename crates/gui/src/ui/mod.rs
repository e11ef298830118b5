pub mod status_bar;
pub mod summary_panel;
