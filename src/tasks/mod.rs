pub mod processing_task;
