//! Services module

pub mod detection;
pub mod inference;
pub mod presentation;
pub mod quota;

pub use detection::{
    DetectionError, DetectionErrorKind, DetectionGateway, DetectionOrchestrator, InferenceStage,
};
pub use inference::{
    CircuitBreaker, FakeDetector, FakeGenerator, InferenceError, LlmConfig, NutritionGenerator,
    ObjectDetector, OpenAiNutritionGenerator, Resilient, RetryPolicy, VisionConfig,
    VisionDetector,
};
pub use presentation::{
    decode_qr_dish, decode_qr_payload, encode_qr_payload, parse_calories, present, present_text,
    CalorieMeter, DishView, PresentationState,
};
pub use quota::{
    ConsumeOutcome, MemoryQuotaLedger, QuotaError, QuotaLedger, QuotaPolicy, QuotaStore,
    QuotaWindowType,
};
