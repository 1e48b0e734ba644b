pub mod catalog;
pub mod import;
pub mod offer;
pub mod sheet;
pub mod tender;

pub use catalog::{CatalogItem, CatalogItemRef, NewCatalogItem, Supplier};
pub use import::{ImportBatch, ImportStatus, IngestReport, SheetReason, SheetStats};
pub use offer::{
    AutopickReport, CandidateMatch, LineDetail, Offer, OfferSnapshot, OfferTotals, OfferType,
    OfferView, ProjectDetail,
};
pub use sheet::{PriceFile, RawCell, Sheet};
pub use tender::{NewTenderLine, TenderLine, TenderProject, TenderProjectSummary};
