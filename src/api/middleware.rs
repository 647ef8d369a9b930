//! # Utilidades de logging para errores
//!
//! Recorre la cadena `source()` que construye thiserror y la registra completa.

use std::error::Error as StdError;

/// Registra la cadena completa de errores
///
/// # Parámetros
/// - `error`: Error a analizar y registrar
/// - `context`: Operación durante la que ocurrió, si se conoce
pub fn log_error_chain<E>(error: &E, context: Option<&str>)
where
    E: StdError + 'static,
{
    let mut error_chain = Vec::new();
    let mut current_error: Option<&dyn StdError> = Some(error);

    while let Some(err) = current_error {
        error_chain.push(err.to_string());
        current_error = err.source();
    }

    match context {
        Some(ctx) => tracing::error!(context = %ctx, error_chain = ?error_chain, "Error con cadena completa"),
        None => tracing::error!(error_chain = ?error_chain, "Error con cadena completa"),
    }
}

/// Extension trait para Results que registra la cadena de errores sin consumirla
///
/// # Ejemplo de uso
/// ```ignore
/// store
///     .delete_booking(id)
///     .await
///     .log_error_context("rollback_booking")?;
/// ```
pub trait ErrorLogExt<T, E> {
    fn log_error_context(self, context: &str) -> Result<T, E>;
}

impl<T, E> ErrorLogExt<T, E> for Result<T, E>
where
    E: StdError + 'static,
{
    fn log_error_context(self, context: &str) -> Result<T, E> {
        if let Err(ref error) = self {
            log_error_chain(error, Some(context));
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::AppError;
    use crate::payment::PaymentError;

    #[test]
    fn results_pass_through_unchanged() {
        let ok: Result<u8, AppError> = Ok(7);
        assert_eq!(ok.log_error_context("test").unwrap(), 7);

        let err: Result<u8, AppError> = Err(AppError::Gateway(PaymentError::NotConfigured));
        let err = err.log_error_context("create_checkout_session").unwrap_err();
        assert!(matches!(err, AppError::Gateway(PaymentError::NotConfigured)));
    }

    #[test]
    fn chain_includes_the_source() {
        let error = AppError::Gateway(PaymentError::Unreachable("timeout".to_string()));
        let mut chain = Vec::new();
        let mut current: Option<&dyn StdError> = Some(&error);
        while let Some(err) = current {
            chain.push(err.to_string());
            current = err.source();
        }

        // Gateway usa #[from]: su causa es el PaymentError
        assert_eq!(chain.len(), 2);
        assert!(chain[1].contains("timeout"));
        log_error_chain(&error, None);
    }
}
