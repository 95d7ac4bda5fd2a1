//! Модули обработки аудио: внешняя утилита, разрешение тайминга, сведение

pub mod audio;
pub mod compositor;
pub mod timing;
