//! The suggested-checks library.
//!
//! A static mapping from cause kind to an ordered list of operator checks.
//! The only dynamic value interpolated is the involved object's name;
//! unknown kinds yield an empty list.

/// Returns the ordered operator checks for a cause kind.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn suggested_checks(kind: &str, involved_object: &str) -> Vec<String> {
    let name = involved_object;
    let checks: Vec<String> = match kind {
        "UnschedulableTaint" => vec![
            "kubectl describe node <node> | grep -A5 Taints".to_string(),
            format!("kubectl get pod {name} -o jsonpath='{{.spec.tolerations}}'"),
            "Compare node taints against the pod's tolerations".to_string(),
        ],
        "InsufficientCpu" | "InsufficientMemory" => vec![
            "kubectl describe nodes | grep -A5 'Allocated resources'".to_string(),
            format!("kubectl get pod {name} -o jsonpath='{{.spec.containers[*].resources}}'"),
            "Lower the pod's requests or add node capacity".to_string(),
        ],
        "NodeAffinityMismatch" => vec![
            format!("kubectl get pod {name} -o jsonpath='{{.spec.affinity}}'"),
            "kubectl get nodes --show-labels".to_string(),
            "Check nodeSelector and affinity terms against node labels".to_string(),
        ],
        "NoNodesAvailable" => vec![
            "kubectl get nodes".to_string(),
            "Check cluster autoscaler activity and node pool sizes".to_string(),
        ],
        "VolumeNodeAffinityConflict" => vec![
            format!("kubectl describe pod {name}"),
            "kubectl get pv -o wide".to_string(),
            "Check the PV's nodeAffinity against schedulable nodes".to_string(),
        ],
        "PvcBlockingScheduling" | "PVCNotBound" | "PVCPendingDuration" => vec![
            "kubectl get pvc".to_string(),
            format!("kubectl describe pvc {name}"),
            "kubectl get pv".to_string(),
            "kubectl get storageclass".to_string(),
        ],
        "SchedulingFlapping" => vec![
            format!("kubectl get events --field-selector involvedObject.name={name}"),
            "Check for churn in node readiness or capacity".to_string(),
        ],
        "PVCMissing" => vec![
            "kubectl get pvc".to_string(),
            format!("kubectl get pod {name} -o jsonpath='{{.spec.volumes}}'"),
            "Create the missing PersistentVolumeClaim".to_string(),
        ],
        "PVUnavailable" => vec![
            "kubectl get pv".to_string(),
            format!("kubectl describe pvc {name}"),
            "Check the bound PersistentVolume's phase".to_string(),
        ],
        "StorageClassMissing" => vec![
            "kubectl get storageclass".to_string(),
            format!("kubectl describe pvc {name}"),
            "Create the storage class or fix the claim's storageClassName".to_string(),
        ],
        "ProvisioningFailed" => vec![
            format!("kubectl describe pvc {name}"),
            "Check the provisioner's controller logs".to_string(),
            "Verify cloud volume quota and permissions".to_string(),
        ],
        "FailedMount" | "FailedAttachVolume" => vec![
            format!("kubectl describe pod {name}"),
            "kubectl get volumeattachment".to_string(),
            "Check kubelet logs on the scheduled node".to_string(),
        ],
        "ImagePullBackOff" | "ErrImagePull" => vec![
            format!("kubectl describe pod {name}"),
            "Verify the image name and tag exist in the registry".to_string(),
            "Check imagePullSecrets and registry credentials".to_string(),
        ],
        "InvalidImageName" => vec![
            format!("kubectl get pod {name} -o jsonpath='{{.spec.containers[*].image}}'"),
            "Fix the malformed image reference".to_string(),
        ],
        "ImageNeverPulled" => vec![
            format!("kubectl get pod {name} -o jsonpath='{{.spec.containers[*].imagePullPolicy}}'"),
            "Pre-load the image on the node or change imagePullPolicy".to_string(),
        ],
        "RegistryUnreachable" => vec![
            "Check registry DNS resolution and connectivity from the node".to_string(),
            format!("kubectl describe pod {name}"),
        ],
        "ImagePullRateLimited" => vec![
            "Check registry rate limits for the pulling identity".to_string(),
            "Authenticate pulls or mirror the image".to_string(),
        ],
        "ImagePullSecretMissing" => vec![
            "kubectl get secret".to_string(),
            format!("kubectl get pod {name} -o jsonpath='{{.spec.imagePullSecrets}}'"),
            "Create a docker-registry secret and reference it from the pod or service account"
                .to_string(),
        ],
        "LivenessProbeFailing" | "ReadinessProbeFailing" | "StartupProbeFailing"
        | "RepeatedProbeFailure" => vec![
            format!("kubectl describe pod {name}"),
            format!("kubectl logs {name} --previous"),
            "Check the probe endpoint, port, and timing thresholds".to_string(),
        ],
        "ProbeFailureRestart" => vec![
            format!("kubectl logs {name} --previous"),
            "Check whether the liveness probe is stricter than startup time".to_string(),
        ],
        "CrashLoopBackoff" | "RapidRestartEscalation" => vec![
            format!("kubectl logs {name}"),
            format!("kubectl logs {name} --previous"),
            format!("kubectl describe pod {name}"),
        ],
        "OOMKilled" => vec![
            format!("kubectl describe pod {name}"),
            "Check container memory limits and actual usage".to_string(),
            "Raise the memory limit or fix the leak".to_string(),
        ],
        "ContainerExitNonZero" => vec![
            format!("kubectl logs {name} --previous"),
            "Check the application's exit path for the reported code".to_string(),
        ],
        "CreateContainerConfigError" => vec![
            format!("kubectl describe pod {name}"),
            "kubectl get configmap".to_string(),
            "kubectl get secret".to_string(),
        ],
        "CreateContainerError" | "RunContainerError" => vec![
            format!("kubectl describe pod {name}"),
            "Check the container command, entrypoint, and runtime logs".to_string(),
        ],
        "ContainerCreatingStuck" => vec![
            format!("kubectl describe pod {name}"),
            "Check volume mounts, sandbox creation, and kubelet logs".to_string(),
        ],
        "FailedCreatePodSandBox" | "CniNotReady" | "NetworkNotReady" => vec![
            format!("kubectl describe pod {name}"),
            "Check CNI plugin pods in kube-system".to_string(),
            "Check kubelet and container runtime logs on the node".to_string(),
        ],
        "PodSandboxChanged" => vec![
            format!("kubectl describe pod {name}"),
            "Check for container runtime restarts on the node".to_string(),
        ],
        "ConfigMapMissing" => vec![
            "kubectl get configmap".to_string(),
            format!("kubectl describe pod {name}"),
            "Create the missing ConfigMap or fix the reference".to_string(),
        ],
        "SecretMissing" => vec![
            "kubectl get secret".to_string(),
            format!("kubectl describe pod {name}"),
            "Create the missing Secret or fix the reference".to_string(),
        ],
        "ServiceAccountMissing" => vec![
            "kubectl get serviceaccount".to_string(),
            format!("kubectl get pod {name} -o jsonpath='{{.spec.serviceAccountName}}'"),
        ],
        "AdmissionWebhookDenied" => vec![
            "kubectl get validatingwebhookconfiguration,mutatingwebhookconfiguration".to_string(),
            "Read the webhook denial message and adjust the manifest".to_string(),
        ],
        "QuotaExceeded" | "OwnerQuotaExceeded" => vec![
            "kubectl get resourcequota".to_string(),
            "kubectl describe resourcequota".to_string(),
            "Free quota or raise the limit".to_string(),
        ],
        "SecurityContextDenied" => vec![
            format!("kubectl get pod {name} -o jsonpath='{{.spec.securityContext}}'"),
            "Check pod security admission labels on the namespace".to_string(),
        ],
        "NodeNotReady" => vec![
            "kubectl get nodes".to_string(),
            "kubectl describe node <node>".to_string(),
            "Check kubelet health on the node".to_string(),
        ],
        "NodeDiskPressure" => vec![
            "kubectl describe node <node>".to_string(),
            "Check node disk usage and image garbage collection".to_string(),
        ],
        "NodeMemoryPressure" => vec![
            "kubectl describe node <node>".to_string(),
            "Check node memory usage and eviction thresholds".to_string(),
        ],
        "NodePidPressure" => vec![
            "kubectl describe node <node>".to_string(),
            "Check process counts on the node".to_string(),
        ],
        "PodEvicted" => vec![
            format!("kubectl describe pod {name}"),
            "Check node conditions at eviction time".to_string(),
            "Review pod priority and resource requests".to_string(),
        ],
        "OwnerFailedCreate" => vec![
            format!("kubectl describe replicaset {name}"),
            "Read the controller's FailedCreate events".to_string(),
        ],
        "DeploymentProgressDeadline" => vec![
            format!("kubectl rollout status deployment/{name}"),
            format!("kubectl describe deployment {name}"),
        ],
        "StatefulSetVolumeConflict" => vec![
            format!("kubectl describe statefulset {name}"),
            "kubectl get pvc".to_string(),
            "Check volumeClaimTemplates against existing claims".to_string(),
        ],
        "PVCPendingThenCrashloop" => vec![
            "kubectl get pvc".to_string(),
            format!("kubectl describe pvc {name}"),
            format!("kubectl logs {name} --previous"),
        ],
        "ImageUpdatedThenCrashloop" => vec![
            format!("kubectl logs {name} --previous"),
            "Compare the running image against the last known-good tag".to_string(),
            "Consider rolling back the image".to_string(),
        ],
        "CrashloopAfterConfigChange" => vec![
            format!("kubectl logs {name} --previous"),
            "Diff the current ConfigMaps/Secrets against the previous revision".to_string(),
            "Consider rolling back the configuration change".to_string(),
        ],
        "NodeNotReadyEvicted" => vec![
            "kubectl get nodes".to_string(),
            "kubectl describe node <node>".to_string(),
            format!("kubectl describe pod {name}"),
        ],
        "InsufficientSignal" => vec![
            format!("kubectl describe pod {name}"),
            format!("kubectl get events --field-selector involvedObject.name={name}"),
            format!("kubectl logs {name}"),
        ],
        _ => Vec::new(),
    };
    checks
}
