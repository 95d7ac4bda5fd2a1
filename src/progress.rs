//! Модуль для отслеживания прогресса выполнения операций
//!
//! Этот модуль предоставляет реализацию паттерна Observer для отслеживания
//! прогресса сборки дубляжа по этапам конвейера.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Информация о прогрессе выполнения операции
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressInfo {
    /// Текущий этап операции
    pub step: String,
    /// Процент выполнения текущего этапа (0.0 - 100.0)
    pub step_progress: f32,
    /// Общий процент выполнения всей операции (0.0 - 100.0)
    pub total_progress: f32,
    /// Дополнительная информация о текущем этапе
    pub details: Option<String>,
}

impl ProgressInfo {
    /// Создает новый экземпляр ProgressInfo
    pub fn new(step: impl Into<String>, step_progress: f32, total_progress: f32, details: Option<String>) -> Self {
        Self {
            step: step.into(),
            step_progress: step_progress.clamp(0.0, 100.0),
            total_progress: total_progress.clamp(0.0, 100.0),
            details,
        }
    }
}

/// Трейт для наблюдателя, получающего уведомления о прогрессе
pub trait ProgressObserver: Send + Sync {
    /// Метод, вызываемый при обновлении прогресса
    fn on_progress_update(&self, progress: ProgressInfo);
}

/// Трейт для объекта, отправляющего уведомления о прогрессе
pub trait ProgressReporter: Send + Sync {
    /// Добавить наблюдателя
    ///
    /// Возвращает идентификатор, по которому наблюдателя можно удалить.
    fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize;

    /// Удалить наблюдателя по идентификатору
    fn remove_observer(&mut self, id: usize) -> Option<Box<dyn ProgressObserver>>;

    /// Уведомить всех наблюдателей о прогрессе
    fn notify_progress(&self, progress: ProgressInfo);
}

/// Реализация ProgressReporter по умолчанию
pub struct DefaultProgressReporter {
    observers: RwLock<HashMap<usize, Box<dyn ProgressObserver>>>,
    next_id: AtomicUsize,
}

impl DefaultProgressReporter {
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(HashMap::new()),
            next_id: AtomicUsize::new(0),
        }
    }
}

impl Default for DefaultProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for DefaultProgressReporter {
    fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.observers.write().insert(id, observer);
        id
    }

    fn remove_observer(&mut self, id: usize) -> Option<Box<dyn ProgressObserver>> {
        self.observers.write().remove(&id)
    }

    fn notify_progress(&self, progress: ProgressInfo) {
        for observer in self.observers.read().values() {
            observer.on_progress_update(progress.clone());
        }
    }
}

/// Наблюдатель, пишущий прогресс в лог
#[derive(Debug, Default)]
pub struct LogProgressObserver;

impl ProgressObserver for LogProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        log::info!(
            "[{:>5.1}%] {} ({:.0}%){}",
            progress.total_progress,
            progress.step,
            progress.step_progress,
            progress
                .details
                .map(|d| format!(": {}", d))
                .unwrap_or_default()
        );
    }
}

/// Этапы конвейера дубляжа
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessStep {
    /// Получение видео и субтитров
    CaptionFetch,
    /// Склейка фрагментов
    SegmentMerge,
    /// Перевод
    Translation,
    /// Синтез речи
    SpeechSynthesis,
    /// Разрешение тайминга
    TimingResolution,
    /// Сведение и нормализация
    Compositing,
}

impl ProcessStep {
    /// Получить название этапа в виде строки
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CaptionFetch => "Получение субтитров",
            Self::SegmentMerge => "Склейка фрагментов",
            Self::Translation => "Перевод",
            Self::SpeechSynthesis => "Синтез речи",
            Self::TimingResolution => "Подгонка тайминга",
            Self::Compositing => "Сведение дорожки",
        }
    }

    /// Получить весовой коэффициент этапа (в процентах от общего процесса)
    pub fn weight(&self) -> f32 {
        match self {
            Self::CaptionFetch => 5.0,
            Self::SegmentMerge => 2.0,
            Self::Translation => 13.0,
            Self::SpeechSynthesis => 55.0,
            Self::TimingResolution => 15.0,
            Self::Compositing => 10.0,
        }
    }
}

struct TrackerState {
    current_step: ProcessStep,
    step_progress: f32,
    total_progress: f32,
    completed_steps: HashMap<ProcessStep, f32>,
}

/// Трекер прогресса для отслеживания выполнения процесса
pub struct ProgressTracker {
    reporter: Option<Box<dyn ProgressReporter>>,
    state: RwLock<TrackerState>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            reporter: None,
            state: RwLock::new(TrackerState {
                current_step: ProcessStep::CaptionFetch,
                step_progress: 0.0,
                total_progress: 0.0,
                completed_steps: HashMap::new(),
            }),
        }
    }

    pub fn with_reporter(reporter: Box<dyn ProgressReporter>) -> Self {
        let mut tracker = Self::new();
        tracker.reporter = Some(reporter);
        tracker
    }

    /// Установить репортер прогресса
    pub fn set_reporter(&mut self, reporter: Box<dyn ProgressReporter>) {
        self.reporter = Some(reporter);
    }

    /// Добавить наблюдателя
    pub fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> Option<usize> {
        self.reporter.as_mut().map(|reporter| reporter.add_observer(observer))
    }

    /// Установить текущий этап; предыдущий считается завершенным
    pub fn set_step(&self, step: ProcessStep) {
        {
            let mut state = self.state.write();
            if state.current_step == step {
                return;
            }
            let previous = state.current_step;
            state.completed_steps.insert(previous, 100.0);
            state.current_step = step;
            state.step_progress = 0.0;
            Self::recompute_total(&mut state);
        }
        self.report_progress(None);
    }

    /// Обновить прогресс текущего этапа
    pub fn update_step_progress(&self, progress: f32, details: Option<String>) {
        {
            let mut state = self.state.write();
            state.step_progress = progress.clamp(0.0, 100.0);
            Self::recompute_total(&mut state);
        }
        self.report_progress(details);
    }

    /// Отметить завершение всего процесса
    pub fn complete(&self) {
        {
            let mut state = self.state.write();
            let current = state.current_step;
            state.completed_steps.insert(current, 100.0);
            state.step_progress = 100.0;
            state.total_progress = 100.0;
        }
        self.report_progress(Some("Процесс завершен".to_string()));
    }

    /// Общий прогресс (0.0 - 100.0)
    pub fn total_progress(&self) -> f32 {
        self.state.read().total_progress
    }

    fn recompute_total(state: &mut TrackerState) {
        let mut total = 0.0;
        let mut total_weight = 0.0;

        for (step, progress) in &state.completed_steps {
            if *step != state.current_step {
                total += step.weight() * progress / 100.0;
                total_weight += step.weight();
            }
        }

        total += state.current_step.weight() * state.step_progress / 100.0;
        total_weight += state.current_step.weight();

        state.total_progress = (total / total_weight * 100.0).clamp(0.0, 100.0);
    }

    fn report_progress(&self, details: Option<String>) {
        if let Some(reporter) = &self.reporter {
            let state = self.state.read();
            let progress = ProgressInfo::new(
                state.current_step.as_str(),
                state.step_progress,
                state.total_progress,
                details,
            );
            drop(state);
            reporter.notify_progress(progress);
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct TestObserver {
        updates: Arc<Mutex<Vec<ProgressInfo>>>,
    }

    impl ProgressObserver for TestObserver {
        fn on_progress_update(&self, progress: ProgressInfo) {
            self.updates.lock().unwrap().push(progress);
        }
    }

    #[test]
    fn test_progress_tracker() {
        let updates = Arc::new(Mutex::new(Vec::new()));
        let mut reporter = DefaultProgressReporter::new();
        reporter.add_observer(Box::new(TestObserver { updates: updates.clone() }));
        let tracker = ProgressTracker::with_reporter(Box::new(reporter));

        tracker.update_step_progress(50.0, None);
        {
            let updates = updates.lock().unwrap();
            assert_eq!(updates.len(), 1);
            assert_eq!(updates[0].step, ProcessStep::CaptionFetch.as_str());
            assert_eq!(updates[0].step_progress, 50.0);
            assert!(updates[0].total_progress > 0.0);
        }

        tracker.set_step(ProcessStep::SegmentMerge);
        tracker.set_step(ProcessStep::SegmentMerge);
        {
            let updates = updates.lock().unwrap();
            assert_eq!(updates.len(), 2);
            assert_eq!(updates[1].step, ProcessStep::SegmentMerge.as_str());
            assert_eq!(updates[1].step_progress, 0.0);
        }

        tracker.complete();
        let updates = updates.lock().unwrap();
        assert_eq!(updates.len(), 3);
        assert_eq!(updates[2].total_progress, 100.0);
        assert_eq!(updates[2].details, Some("Процесс завершен".to_string()));
    }

    #[test]
    fn test_remove_observer() {
        let updates = Arc::new(Mutex::new(Vec::new()));
        let mut reporter = DefaultProgressReporter::new();
        let id = reporter.add_observer(Box::new(TestObserver { updates: updates.clone() }));
        assert!(reporter.remove_observer(id).is_some());

        reporter.notify_progress(ProgressInfo::new("x", 1.0, 1.0, None));
        assert!(updates.lock().unwrap().is_empty());
    }
}
