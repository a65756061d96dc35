pub mod decide;
pub mod grant;
pub mod sections;
