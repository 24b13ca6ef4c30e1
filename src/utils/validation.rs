//! Utilidades de validación
//!
//! Este módulo contiene funciones helper para validación de datos
//! del contrato tipado del core: coordenadas, capacidades y timestamps.

use chrono::{DateTime, Utc};
use validator::ValidationError;

/// Validar latitud en rango [-90, 90]
pub fn validate_latitude(value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || !(-90.0..=90.0).contains(&value) {
        let mut error = ValidationError::new("latitude");
        error.add_param("value".into(), &value);
        return Err(error);
    }
    Ok(())
}

/// Validar longitud en rango [-180, 180]
pub fn validate_longitude(value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || !(-180.0..=180.0).contains(&value) {
        let mut error = ValidationError::new("longitude");
        error.add_param("value".into(), &value);
        return Err(error);
    }
    Ok(())
}

/// Validar capacidad o demanda: finita y estrictamente positiva
pub fn validate_capacity(value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value <= 0.0 {
        let mut error = ValidationError::new("capacity");
        error.add_param("value".into(), &value);
        return Err(error);
    }
    Ok(())
}

/// Validar ventana de tiempo: inicio <= fin
pub fn validate_time_window(
    start: &Option<DateTime<Utc>>,
    end: &Option<DateTime<Utc>>,
) -> Result<(), ValidationError> {
    if let (Some(s), Some(e)) = (start, end) {
        if s > e {
            let mut error = ValidationError::new("time_window");
            error.add_param("start".into(), &s.to_rfc3339());
            error.add_param("end".into(), &e.to_rfc3339());
            return Err(error);
        }
    }
    Ok(())
}

/// Validar que un timestamp no esté absurdamente en el futuro
/// (updates de posición con relojes desincronizados)
pub fn validate_timestamp(value: &DateTime<Utc>) -> Result<(), ValidationError> {
    let max_skew = chrono::Duration::hours(1);
    if *value > Utc::now() + max_skew {
        let mut error = ValidationError::new("timestamp");
        error.add_param("value".into(), &value.to_rfc3339());
        return Err(error);
    }
    Ok(())
}
