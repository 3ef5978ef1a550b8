mod r#static;
pub use r#static::StaticCredentialProvider;
