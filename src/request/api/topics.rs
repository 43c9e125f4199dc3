use crate::protocol::{ChainNode, ErrorCode, TopicChain, TopicsRequest, TopicsResponse};
use crate::request::RequestContext;

pub struct TopicsRequestHandler;

impl TopicsRequestHandler {
    /// Maps each topic to its replica chain. Unknown topics get an error
    /// slot; this api never creates anything.
    pub async fn handle_request(
        &self,
        request: TopicsRequest,
        context: &RequestContext,
    ) -> TopicsResponse {
        let topics = if request.topics.is_empty() {
            context.log_manager.topics()
        } else {
            request.topics
        };

        let topics = topics
            .into_iter()
            .map(|topic| {
                if !context.log_manager.has_topic(&topic) {
                    return TopicChain {
                        topic,
                        error_code: ErrorCode::UnknownTopicOrPartition,
                        chain: Vec::new(),
                    };
                }
                let chain = context
                    .cluster
                    .chain(&topic)
                    .into_iter()
                    .map(|node| ChainNode {
                        host: node.host,
                        port: node.port,
                    })
                    .collect();
                TopicChain {
                    topic,
                    error_code: ErrorCode::None,
                    chain,
                }
            })
            .collect();

        TopicsResponse { topics }
    }
}
