//! Configuration management for Tekst.

mod settings;

pub use settings::{
    CaptionSettings, CatalogSettings, GeneralSettings, PlatformSettings, RecognitionSettings,
    SegmentationSettings, Settings,
};
