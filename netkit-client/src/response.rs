//! Response processing.
//!
//! A [`ResponsePipeline`] runs an ordered list of [`ProcessingStep`]s over a
//! received response and then decodes the body once. Validation runs on every
//! attempt; decoding only runs on the response that ends the call.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use netkit_core::{
    BodyDecoder, ErrorMapper, JsonDecoder, NetworkError, StatusValidator, TransportError,
    WireResponse, decode_body,
};
use serde::de::DeserializeOwned;

/// A validation or transformation applied to every received response.
pub trait ProcessingStep: Send + Sync {
    /// Pass the response on, or reject it.
    fn process(&self, response: WireResponse) -> Result<WireResponse, NetworkError>;
}

impl ProcessingStep for StatusValidator {
    fn process(&self, response: WireResponse) -> Result<WireResponse, NetworkError> {
        self.validate(response).map_err(ErrorMapper::map)
    }
}

/// Ordered response steps plus a body decoder.
pub struct ResponsePipeline<D = JsonDecoder> {
    steps: Vec<Arc<dyn ProcessingStep>>,
    decoder: D,
}

impl<D> Clone for ResponsePipeline<D>
where
    D: Clone,
{
    fn clone(&self) -> Self {
        Self {
            steps: self.steps.clone(),
            decoder: self.decoder.clone(),
        }
    }
}

impl<D> fmt::Debug for ResponsePipeline<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponsePipeline")
            .field("steps", &self.steps.len())
            .finish_non_exhaustive()
    }
}

impl Default for ResponsePipeline<JsonDecoder> {
    /// Default status validation with JSON decoding.
    fn default() -> Self {
        Self::new(JsonDecoder).step(StatusValidator::default())
    }
}

impl<D: BodyDecoder> ResponsePipeline<D> {
    /// Create a pipeline with no steps.
    pub fn new(decoder: D) -> Self {
        Self {
            steps: Vec::new(),
            decoder,
        }
    }

    /// Create a pipeline from prebuilt steps.
    pub fn with_steps(decoder: D, steps: Vec<Arc<dyn ProcessingStep>>) -> Self {
        Self { steps, decoder }
    }

    /// Append a step.
    pub fn step(mut self, step: impl ProcessingStep + 'static) -> Self {
        self.steps.push(Arc::new(step));
        self
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the pipeline has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Get the decoder.
    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// Run every step in order, stopping at the first rejection.
    pub fn validate(&self, response: WireResponse) -> Result<WireResponse, NetworkError> {
        self.steps
            .iter()
            .try_fold(response, |response, step| step.process(response))
    }

    /// Decode the body of an already validated response.
    ///
    /// Empty bodies decode to [`NoContent`](netkit_core::NoContent) without
    /// touching the decoder.
    pub fn decode<T>(&self, response: &WireResponse) -> Result<T, NetworkError>
    where
        T: DeserializeOwned + 'static,
    {
        decode_body(&self.decoder, &response.body).map_err(ErrorMapper::map)
    }

    /// Map a transport result, validate it, then decode it.
    pub fn process<T>(&self, result: Result<WireResponse, TransportError>) -> Result<T, NetworkError>
    where
        T: DeserializeOwned + 'static,
    {
        let response = self.validate(result.map_err(ErrorMapper::map)?)?;
        self.decode(&response)
    }

    /// Map a transport result and validate it, returning the raw body.
    pub fn process_raw(
        &self,
        result: Result<WireResponse, TransportError>,
    ) -> Result<Bytes, NetworkError> {
        let response = self.validate(result.map_err(ErrorMapper::map)?)?;
        Ok(response.body)
    }
}
