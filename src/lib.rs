//! Fleet Route Optimization & Dynamic Dispatch Engine
//!
//! Asigna pedidos de entrega a una flota, construye secuencias de visita
//! por vehículo minimizando costo de viaje bajo restricciones de
//! capacidad, y mantiene esas asignaciones al día a medida que llegan
//! pedidos nuevos y los vehículos se mueven.

pub mod api;
pub mod cache;
pub mod config;
pub mod models;
pub mod repositories;
pub mod services;
pub mod state;
pub mod utils;
