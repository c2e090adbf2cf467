/// Data layer: axis, channel selection, capture buffer and files.
///
/// Architecture:
/// ```text
///   WavelengthAxis + intensities
///        │
///        ▼
///   ┌──────────┐
///   │  model    │  Frame, Channel, nearest-left lookup
///   └──────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ selection  │  typed wavelength → axis index (×3)
///   └───────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ capture   │  parallel arrays, fixed capacity → Box<[f64]>
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ storage   │  `#` header + CSV rows, one file per channel
///   └──────────┘
/// ```

pub mod capture;
pub mod model;
pub mod selection;
pub mod storage;
