//! Модуль для работы с субтитрами: парсинг, склейка, сопоставление перевода

pub mod analyzer;
pub mod mapper;
pub mod merger;
pub mod parser;
